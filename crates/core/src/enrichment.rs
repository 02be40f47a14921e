//! Request enrichment: user agent parsing, GeoIP and datacenter detection.
//!
//! All lookups are in-memory and non-blocking so they can run on the
//! ingestion hot path.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use woothee::parser::Parser;

use crate::error::{Error, Result};
use crate::records::{ClientInfo, GeoLocation};

/// Seed list of hosting and cloud ranges.
///
/// Deployments should override this through configuration with the ranges
/// published by the providers they care about.
pub const DEFAULT_DATACENTER_RANGES: &[&str] = &[
    // Amazon Web Services
    "3.0.0.0/9",
    "18.128.0.0/9",
    "52.0.0.0/10",
    "54.64.0.0/11",
    // Google Cloud
    "34.64.0.0/10",
    "35.184.0.0/13",
    // Microsoft Azure
    "20.33.0.0/16",
    "40.64.0.0/10",
    // DigitalOcean
    "104.131.0.0/16",
    "159.203.0.0/16",
    "167.99.0.0/16",
    // Hetzner
    "95.216.0.0/15",
    "135.181.0.0/16",
    // OVH
    "51.68.0.0/16",
    "145.239.0.0/16",
    // Linode
    "45.33.0.0/17",
    "2600:3c00::/27",
];

/// GeoIP database seam. The database itself is an external collaborator.
pub trait GeoLookup: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Option<GeoLocation>;
}

/// Used when no GeoIP database is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeoLookup;

impl GeoLookup for NoGeoLookup {
    fn lookup(&self, _ip: IpAddr) -> Option<GeoLocation> {
        None
    }
}

/// User agent parser.
///
/// Uses the woothee library for fast UA parsing (~6.8us/parse).
pub struct UserAgentParser {
    parser: Parser,
}

impl UserAgentParser {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Browser, version, OS and device category. Unknown parts stay "unknown".
    pub fn parse(&self, user_agent: &str) -> ClientInfo {
        let mut info = ClientInfo::default();
        if user_agent.is_empty() {
            return info;
        }

        if let Some(result) = self.parser.parse(user_agent) {
            if !result.name.is_empty() && result.name != "UNKNOWN" {
                info.browser = result.name.to_string();
            }
            if !result.version.is_empty() && result.version != "UNKNOWN" {
                info.browser_version = result.version.to_string();
            }
            if !result.os.is_empty() && result.os != "UNKNOWN" {
                info.os = result.os.to_string();
            }

            // woothee categories: pc, smartphone, mobilephone, crawler, appliance, misc
            info.device = match result.category {
                "pc" => "desktop",
                "smartphone" | "mobilephone" => "mobile",
                "crawler" => "bot",
                "appliance" => "other",
                _ => "unknown",
            }
            .to_string();
        }

        info
    }
}

impl Default for UserAgentParser {
    fn default() -> Self {
        Self::new()
    }
}

/// One CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    network: IpAddr,
    prefix: u8,
}

impl IpRange {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = prefix_mask_u32(self.prefix);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = prefix_mask_u128(self.prefix);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            // IPv4-mapped IPv6 peers are normalised by the caller.
            _ => false,
        }
    }
}

impl FromStr for IpRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s.trim().split_once('/').unwrap_or((s.trim(), ""));
        let network: IpAddr = addr
            .parse()
            .map_err(|_| Error::config(format!("invalid CIDR address: {}", s)))?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        let prefix = if prefix.is_empty() {
            max
        } else {
            prefix
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= max)
                .ok_or_else(|| Error::config(format!("invalid CIDR prefix: {}", s)))?
        };
        Ok(Self { network, prefix })
    }
}

fn prefix_mask_u32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn prefix_mask_u128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

/// Known hosting/cloud address space.
#[derive(Debug, Clone, Default)]
pub struct DatacenterRanges {
    ranges: Vec<IpRange>,
}

impl DatacenterRanges {
    /// Parse a list of CIDR strings. Any invalid entry fails the whole list.
    pub fn parse<S: AsRef<str>>(cidrs: &[S]) -> Result<Self> {
        let ranges = cidrs
            .iter()
            .map(|c| c.as_ref().parse())
            .collect::<Result<Vec<IpRange>>>()?;
        Ok(Self { ranges })
    }

    pub fn with_defaults() -> Self {
        // The seed list is static and covered by tests.
        Self::parse(DEFAULT_DATACENTER_RANGES).unwrap_or_default()
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = normalize_ip(ip);
        self.ranges.iter().any(|r| r.contains(ip))
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Unwrap IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`).
pub fn normalize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

/// Result of enriching one request.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub client: ClientInfo,
    pub geo: GeoLocation,
    pub datacenter_ip: bool,
}

/// Bundles the per-request lookups.
pub struct Enricher {
    user_agents: UserAgentParser,
    geo: Arc<dyn GeoLookup>,
    datacenters: DatacenterRanges,
}

impl Enricher {
    pub fn new(geo: Arc<dyn GeoLookup>, datacenters: DatacenterRanges) -> Self {
        Self {
            user_agents: UserAgentParser::new(),
            geo,
            datacenters,
        }
    }

    /// Enrich a request. Unparseable IPs get no geo and are not datacenter IPs.
    pub fn enrich(&self, ip: &str, user_agent: &str) -> Enrichment {
        let client = self.user_agents.parse(user_agent);
        let Ok(addr) = ip.parse::<IpAddr>() else {
            return Enrichment {
                client,
                ..Default::default()
            };
        };
        let addr = normalize_ip(addr);

        Enrichment {
            client,
            geo: self.geo.lookup(addr).unwrap_or_default(),
            datacenter_ip: self.datacenters.contains(addr),
        }
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new(Arc::new(NoGeoLookup), DatacenterRanges::with_defaults())
    }
}
