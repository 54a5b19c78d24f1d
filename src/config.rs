use std::env;
use std::time::Duration;

use crate::models::BppServiceType;

/// Base URLs of the BPP services this BAP talks to.
#[derive(Clone, Debug)]
pub struct BppUrls {
    pub flights: String,
    pub international_flights: String,
    pub hotels: String,
    pub buses: String,
    pub trains: String,
    pub experiences: String,
}

impl BppUrls {
    pub fn url_for(&self, service: BppServiceType) -> &str {
        match service {
            BppServiceType::Flights => &self.flights,
            BppServiceType::InternationalFlights => &self.international_flights,
            BppServiceType::Hotels => &self.hotels,
            BppServiceType::Buses => &self.buses,
            BppServiceType::Trains => &self.trains,
            BppServiceType::Experiences => &self.experiences,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub bap_id: String,
    pub bap_uri: String,
    pub beckn_domain: String,
    pub beckn_country: String,
    pub beckn_city: String,
    pub core_version: String,
    pub bpp_timeout_secs: u64,
    pub bpp_urls: BppUrls,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8081),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "bap.db".to_string()),
            bap_id: env::var("BAP_ID")
                .unwrap_or_else(|_| "travel-discovery-bap.example.com".to_string()),
            bap_uri: env::var("BAP_URI").unwrap_or_else(|_| "http://127.0.0.1:8081".to_string()),
            beckn_domain: env::var("BECKN_DOMAIN").unwrap_or_else(|_| "mobility".to_string()),
            beckn_country: env::var("BECKN_COUNTRY").unwrap_or_else(|_| "IND".to_string()),
            beckn_city: env::var("BECKN_CITY").unwrap_or_else(|_| "std:080".to_string()),
            core_version: env::var("BECKN_CORE_VERSION").unwrap_or_else(|_| "1.1.0".to_string()),
            bpp_timeout_secs: env::var("BPP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(10),
            bpp_urls: BppUrls {
                flights: env_url("FLIGHTS_BPP_URL", "http://127.0.0.1:7001"),
                international_flights: env_url("FLIGHTS_INTL_BPP_URL", "http://127.0.0.1:7005"),
                hotels: env_url("HOTELS_BPP_URL", "http://127.0.0.1:7003"),
                buses: env_url("BUSES_BPP_URL", "http://127.0.0.1:3004"),
                trains: env_url("TRAINS_BPP_URL", "http://127.0.0.1:3005"),
                experiences: env_url("EXPERIENCES_BPP_URL", "http://127.0.0.1:3006"),
            },
        }
    }

    pub fn bpp_timeout(&self) -> Duration {
        Duration::from_secs(self.bpp_timeout_secs)
    }
}

fn env_url(key: &str, default: &str) -> String {
    env::var(key)
        .map(|v| v.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| default.to_string())
}
