use sysinfo::System;

use super::sha256_hex;

const MACHINE_ID_LENGTH: usize = 32;

/// Identifier a license is bound to. Stable across reboots, derived from the host name, the
/// OS name and the CPU architecture.
pub fn machine_id() -> String {
    let parts = [
        System::host_name().unwrap_or_default(),
        System::name().unwrap_or_default(),
        std::env::consts::ARCH.to_string(),
    ];
    machine_id_from(&parts)
}

fn machine_id_from(parts: &[String]) -> String {
    let mut id = sha256_hex(parts.join("|"));
    id.truncate(MACHINE_ID_LENGTH);
    id
}

#[cfg(test)]
mod tests {
    use super::{machine_id, machine_id_from};

    #[test]
    fn test_machine_id_is_stable() {
        let id = machine_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, machine_id());
    }

    #[test]
    fn test_machine_id_depends_on_parts() {
        let a = machine_id_from(&["desk".into(), "Linux".into(), "x86_64".into()]);
        let b = machine_id_from(&["laptop".into(), "Linux".into(), "x86_64".into()]);
        assert_ne!(a, b);
    }
}
