//! HTTP clients for the external collaborators of the wildnav engine:
//! routing, geocoding, weather, species occurrence and place-of-safety
//! search, all behind a resilient retrying fetch layer.

pub mod fetch;
pub mod geocode;
pub mod occurrence;
pub mod places;
pub mod routing;
pub mod weather;

pub use fetch::{FetchError, ResilientClient, RetryPolicy};
pub use geocode::{GeocodeClient, GeocodeError};
pub use occurrence::{OccurrenceClient, SightingProvider};
pub use places::{OverpassClient, SafePlaceProvider};
pub use routing::{RouteProvider, RoutingClient};
pub use weather::{CurrentWeather, WeatherClient, WeatherProvider};
