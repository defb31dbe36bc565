//! Static lookup table of load targets.
//!
//! Targets are the named endpoints eligible to receive generated load. The
//! mapping from symbolic name to port is fixed at deployment time; names not
//! listed here are silently skipped by the supervisor.

/// Symbolic target name to port.
pub const TARGET_PORTS: &[(&str, u16)] = &[
    ("node1", 5001),
    ("node2", 5002),
    ("node3", 5003),
];

/// Resolve a target name to its port, or `None` for unknown names.
pub fn port_for(name: &str) -> Option<u16> {
    TARGET_PORTS
        .iter()
        .find(|(target, _)| *target == name)
        .map(|(_, port)| *port)
}

/// URL the load worker drives requests at. Targets are addressed by name on
/// the sandbox's Docker network.
pub fn target_url(name: &str, port: u16) -> String {
    format!("http://{name}:{port}/")
}
