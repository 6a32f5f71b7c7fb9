/// Core Server Framework Module
///
/// - server.rs: server composition root and the stdio request loop

pub mod server;
