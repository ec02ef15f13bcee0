pub mod adapter;

pub use adapter::{Adapter, Capabilities, Created, ModelDescriptor};
