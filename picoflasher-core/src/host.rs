pub mod dispatcher;
pub mod frame;
pub mod stream;
pub mod transport;
