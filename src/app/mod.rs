pub mod providers;

pub use providers::{build_provider, build_resolver, BrasilApiProvider, GeocodeProvider, ScrapeProvider};
