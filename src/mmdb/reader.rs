use super::{Network, NetworkCursor, Source};
use crate::error::{IngestError, Result};
use crate::types::{AttributeRecord, Offset};
use maxminddb::{LookupResult, MaxMindDbError, Metadata, Within, WithinOptions};
use std::net::IpAddr;
use std::path::Path;

/// A MaxMind DB file loaded into memory
pub struct Reader {
    inner: maxminddb::Reader<Vec<u8>>,
}

impl Reader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let inner = maxminddb::Reader::open_readfile(path)
            .map_err(|e| IngestError::SourceOpen(format!("{}: {}", path.display(), e)))?;
        Ok(Reader { inner })
    }

    pub fn from_bytes(buf: Vec<u8>) -> Result<Self> {
        let inner = maxminddb::Reader::from_source(buf)
            .map_err(|e| IngestError::SourceOpen(e.to_string()))?;
        Ok(Reader { inner })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.inner.metadata
    }

    /// Walk the search tree depth-first, left branches first.
    ///
    /// With `skip_aliases`, the IPv4 subtree of an IPv6 database is only
    /// visited through `::/96` and its networks are reported as IPv4.
    pub fn iter_networks(&self, skip_aliases: bool) -> Result<Networks<'_>> {
        let options = if skip_aliases {
            WithinOptions::default()
        } else {
            WithinOptions::default().include_aliased_networks()
        };
        let within = self.inner.networks(options).map_err(enumeration_error)?;
        Ok(Networks {
            within,
            current: None,
            error: None,
        })
    }
}

impl Source for Reader {
    fn networks(&self, skip_aliases: bool) -> Result<Box<dyn NetworkCursor + '_>> {
        Ok(Box::new(self.iter_networks(skip_aliases)?))
    }

    fn lookup_offset(&self, ip: IpAddr) -> Result<Option<Offset>> {
        let ip = match ip {
            IpAddr::V6(v6) if self.inner.metadata.ip_version == 4 => match v6.to_ipv4_mapped() {
                Some(v4) => IpAddr::V4(v4),
                None => return Ok(None),
            },
            ip => ip,
        };
        let result = self.inner.lookup(ip).map_err(enumeration_error)?;
        Ok(result.offset().map(|offset| Offset(offset as u64)))
    }
}

/// Networks of a [`Reader`], with the payload of the current one decodable
pub struct Networks<'a> {
    within: Within<'a, Vec<u8>>,
    current: Option<LookupResult<'a, Vec<u8>>>,
    error: Option<IngestError>,
}

impl Networks<'_> {
    fn advance(&mut self) -> Result<Option<Network>> {
        for result in self.within.by_ref() {
            let result = result.map_err(enumeration_error)?;
            let Some(offset) = result.offset() else {
                continue;
            };
            let prefix = result.network().map_err(enumeration_error)?;
            self.current = Some(result);
            return Ok(Some(Network {
                prefix,
                offset: Offset(offset as u64),
            }));
        }
        Ok(None)
    }
}

impl Iterator for Networks<'_> {
    type Item = Network;

    fn next(&mut self) -> Option<Network> {
        if self.error.is_some() {
            return None;
        }
        match self.advance() {
            Ok(network) => network,
            Err(e) => {
                self.current = None;
                self.error = Some(e);
                None
            }
        }
    }
}

impl NetworkCursor for Networks<'_> {
    fn record(&self) -> Result<AttributeRecord> {
        let result = self
            .current
            .as_ref()
            .ok_or_else(|| IngestError::Enumeration("no current network".to_string()))?;
        let offset = result.offset().unwrap_or_default() as u64;
        result
            .decode::<AttributeRecord>()
            .map_err(|e| IngestError::SourceDecode {
                offset,
                reason: e.to_string(),
            })?
            .ok_or_else(|| IngestError::SourceDecode {
                offset,
                reason: "network has no data".to_string(),
            })
    }

    fn finish(&mut self) -> Result<()> {
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn enumeration_error(e: MaxMindDbError) -> IngestError {
    IngestError::Enumeration(e.to_string())
}
