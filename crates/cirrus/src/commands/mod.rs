pub mod bootstrap;
pub mod destroy;
pub mod instances;
pub mod metadata;
pub mod start;
pub mod status;
pub mod stop;
