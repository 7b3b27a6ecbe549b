mod gate_session;

pub use gate_session::ws_gate_handler;
