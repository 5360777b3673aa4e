// Geo/device enricher. Geo lookup is a binary search over an
// immutable, memory-resident range table loaded at startup; device parsing
// is a UA rule cascade (via `woothee`) memoized in a bounded LRU.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;

use woothee::parser::Parser;

use crate::models::click_event::DeviceType;

const DEVICE_CACHE_CAPACITY: usize = 50_000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoInfo {
    pub country: String,
    pub country_code: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInfo {
    pub device_type: DeviceType,
    pub browser: String,
    pub os: String,
}

struct GeoRange<T> {
    start: T,
    end: T,
    info: GeoInfo,
}

/// Immutable range table, sorted by `start`, queried with a binary search.
/// Built once at startup; never mutated afterward, so lookups never block.
pub struct GeoDatabase {
    ipv4_ranges: Vec<GeoRange<u32>>,
    ipv6_ranges: Vec<GeoRange<u128>>,
}

impl GeoDatabase {
    /// An empty database: every lookup misses and returns the zero-value
    /// `GeoInfo`. Used when no range data file is configured.
    pub fn empty() -> Self {
        Self {
            ipv4_ranges: Vec::new(),
            ipv6_ranges: Vec::new(),
        }
    }

    pub fn from_ipv4_ranges(mut ranges: Vec<(u32, u32, GeoInfo)>) -> Self {
        ranges.sort_by_key(|(start, _, _)| *start);
        Self {
            ipv4_ranges: ranges
                .into_iter()
                .map(|(start, end, info)| GeoRange { start, end, info })
                .collect(),
            ipv6_ranges: Vec::new(),
        }
    }

    pub fn lookup(&self, ip: IpAddr) -> GeoInfo {
        match ip {
            IpAddr::V4(v4) => Self::binary_search(&self.ipv4_ranges, u32::from(v4)),
            IpAddr::V6(v6) => Self::binary_search(&self.ipv6_ranges, u128::from(v6)),
        }
        .unwrap_or_default()
    }

    fn binary_search<T: Ord + Copy>(ranges: &[GeoRange<T>], addr: T) -> Option<GeoInfo> {
        let idx = ranges.partition_point(|r| r.start <= addr);
        if idx == 0 {
            return None;
        }
        let candidate = &ranges[idx - 1];
        if addr >= candidate.start && addr <= candidate.end {
            Some(candidate.info.clone())
        } else {
            None
        }
    }
}

struct DeviceLru {
    map: HashMap<String, DeviceInfo>,
    order: VecDeque<String>,
    capacity: usize,
}

impl DeviceLru {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn get(&mut self, key: &str) -> Option<DeviceInfo> {
        if let Some(info) = self.map.get(key).cloned() {
            if let Some(pos) = self.order.iter().position(|k| k == key) {
                self.order.remove(pos);
            }
            self.order.push_back(key.to_string());
            Some(info)
        } else {
            None
        }
    }

    fn insert(&mut self, key: String, info: DeviceInfo) {
        if self.map.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.map.insert(key, info);
    }
}

pub struct Enricher {
    geo: GeoDatabase,
    device_cache: Mutex<DeviceLru>,
}

impl Enricher {
    pub fn new(geo: GeoDatabase) -> Self {
        Self {
            geo,
            device_cache: Mutex::new(DeviceLru::new(DEVICE_CACHE_CAPACITY)),
        }
    }

    pub fn enrich(&self, ip: IpAddr, user_agent: &str) -> (GeoInfo, DeviceInfo) {
        (self.geo.lookup(ip), self.parse_device(user_agent))
    }

    fn parse_device(&self, user_agent: &str) -> DeviceInfo {
        {
            let mut cache = self.device_cache.lock().expect("device cache poisoned");
            if let Some(cached) = cache.get(user_agent) {
                return cached;
            }
        }

        let parser = Parser::new();
        let info = match parser.parse(user_agent) {
            Some(result) => DeviceInfo {
                device_type: match result.category {
                    "pc" => DeviceType::Desktop,
                    "smartphone" | "mobilephone" => DeviceType::Mobile,
                    "tablet" => DeviceType::Tablet,
                    "crawler" => DeviceType::Bot,
                    _ => DeviceType::Unknown,
                },
                browser: result.name.to_string(),
                os: result.os.to_string(),
            },
            None => DeviceInfo::default(),
        };

        let mut cache = self.device_cache.lock().expect("device cache poisoned");
        cache.insert(user_agent.to_string(), info.clone());
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample_geo() -> GeoInfo {
        GeoInfo {
            country: "United States".to_string(),
            country_code: "US".to_string(),
            city: "Ashburn".to_string(),
            latitude: 39.04,
            longitude: -77.48,
            timezone: "America/New_York".to_string(),
        }
    }

    #[test]
    fn ipv4_lookup_hits_matching_range() {
        let db = GeoDatabase::from_ipv4_ranges(vec![(
            u32::from(Ipv4Addr::new(10, 0, 0, 0)),
            u32::from(Ipv4Addr::new(10, 0, 0, 255)),
            sample_geo(),
        )]);

        let info = db.lookup(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 42)));
        assert_eq!(info.country_code, "US");
    }

    #[test]
    fn unknown_ip_yields_empty_geo_not_error() {
        let db = GeoDatabase::empty();
        let info = db.lookup(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)));
        assert_eq!(info, GeoInfo::default());
    }

    #[test]
    fn device_parsing_is_memoized() {
        let enricher = Enricher::new(GeoDatabase::empty());
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 Safari/537.36";
        let (_, first) = enricher.enrich(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), ua);
        let (_, second) = enricher.enrich(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), ua);
        assert_eq!(first, second);
    }
}
