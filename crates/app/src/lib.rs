pub mod client;
pub mod config;
pub mod error;
pub mod golden;
pub mod normalize;
pub mod sampling;
pub mod template;

pub use client::ApiSession;
pub use config::Variables;
pub use error::{FixtureError, FixtureResult};
pub use golden::GoldenFixtures;
pub use normalize::{UnstableTemplater, strip_unstable_data};
pub use sampling::Sampler;
pub use template::{TemplateVars, set_ckan_vars};

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `info`). Safe to call repeatedly.
pub fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
