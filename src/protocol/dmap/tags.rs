//! Static tag -> type table, used by the recursive decoder to know whether
//! a tag's payload is a nested container or a typed leaf, and if a leaf,
//! which shape. Grounded on `pyatv`'s `dmap/tag_definitions.py` content
//! table, trimmed to the tags this crate's metadata/listing paths use.

/// The wire-level shape of a DMAP tag's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmapType {
    /// Payload is itself a sequence of nested tag records.
    Container,
    /// Payload is a big-endian signed integer, 1/2/4/8 bytes wide.
    Int,
    /// Payload is a big-endian unsigned integer, 1/2/4/8 bytes wide.
    UInt,
    /// Payload is a UTF-8 string.
    String,
    /// Payload is a 4-byte big-endian seconds-since-epoch timestamp.
    Date,
    /// Payload's shape is unknown or deliberately untyped.
    Raw,
}

/// Look up the wire type for a 4-character DMAP tag.
///
/// Unknown tags decode as [`DmapType::Raw`] rather than erroring, since new
/// content codes appear across tvOS/iTunes versions and a conservative
/// fallback keeps the decoder forward-compatible.
#[must_use]
pub fn type_of(tag: &str) -> DmapType {
    match tag {
        // Containers
        "mlog" // dmap.loginresponse
        | "mlcl" // dmap.listing
        | "mlit" // dmap.listingitem
        | "mshl" // dmap.haslp (login)
        | "cmst" // dacp.playstatus
        | "canp" // dacp.nowplaying (4 x u32, but treated as raw elsewhere)
        | "apso" // daap.serverinforesponse.supportsextensions
        | "msrv" // dmap.serverinforesponse
        | "avdb" // daap.serverdatabases
        | "adbs" => DmapType::Container, // daap.databasesongs

        // Strings
        "minm" // dmap.itemname
        | "asar" // daap.songartist
        | "asal" // daap.songalbum
        | "asgn" // daap.songgenre
        | "cann" // dacp.nowplayingtrack
        | "cana" // dacp.nowplayingartist
        | "canl" // dacp.nowplayingalbum
        | "cang" => DmapType::String, // dacp.nowplayinggenre

        // Unsigned integers
        "miid" // dmap.itemid
        | "mlid" // dmap.sessionid
        | "mper" // dmap.persistentid
        | "mstt" // dmap.status
        | "mtco" // dmap.specifiedtotalcount
        | "mrco" // dmap.returnedcount
        | "asdk" // daap.songdatakind
        | "astn" // daap.songtracknumber
        | "asdn" // daap.songdiscnumber
        | "asyr" // daap.songyear
        | "astm" // daap.songtime
        | "cmsr" // dacp.serverrevision
        | "cast" // dacp.songtime (current position)
        | "caps" // dacp.playerstate
        | "cash" // dacp.shufflestate
        | "carp" // dacp.repeatstate
        | "cmvo" // dacp.volume
        => DmapType::UInt,

        // Dates
        "mdcl" => DmapType::Date,

        _ => DmapType::Raw,
    }
}
