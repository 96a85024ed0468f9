pub mod assertions;
pub mod component_builder;
pub mod mirror;
pub mod test_view;
pub mod tracer;
pub mod trail_exchange;

pub use component_builder::TestComponentBuilder;
pub use mirror::verify_mirror;
pub use test_view::TestView;
pub use tracer::{tracer, TraceLog, Tracer};
pub use trail_exchange::{exchange_trail, ExchangeError};
