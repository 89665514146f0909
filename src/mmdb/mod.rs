//! MMDB source
//!
//! Networks and payloads come from the `maxminddb` reader. Ingestion only
//! needs what [`Source`] exposes: enumerating networks with the offset of
//! their payload, decoding the payload of the current network, and looking
//! up the payload offset of a single address.

pub mod reader;

pub use maxminddb::Metadata;
pub use reader::{Networks, Reader};

use crate::error::Result;
use crate::types::{AttributeRecord, Offset};
use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// One enumerated network and the offset of its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub prefix: IpNetwork,
    pub offset: Offset,
}

/// Single-pass cursor over the networks of a source.
///
/// Iteration stops early on a corrupt tree. The error is only reported by
/// [`NetworkCursor::finish`], which must be called once the iterator is
/// exhausted.
pub trait NetworkCursor: Iterator<Item = Network> {
    /// Decode the payload of the network last returned by `next`
    fn record(&self) -> Result<AttributeRecord>;

    fn finish(&mut self) -> Result<()>;
}

/// Read contract of an IP-to-attributes database
pub trait Source {
    /// Enumerate every network with data, in ascending address order
    fn networks(&self, skip_aliases: bool) -> Result<Box<dyn NetworkCursor + '_>>;

    /// Offset of the record covering `ip`, or `None` if the address has no data
    fn lookup_offset(&self, ip: IpAddr) -> Result<Option<Offset>>;
}

/// Open one of the databases under `src/mmdb/testdata`
#[cfg(test)]
pub(crate) fn fixture(name: &str) -> Reader {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("src/mmdb/testdata")
        .join(name);
    Reader::open(path).unwrap()
}
