#[cfg(test)]
pub mod tests {
    use std::process::Command;

    fn heapctl(args: &[&str]) -> std::process::Output {
        Command::new(env!("CARGO_BIN_EXE_heapctl"))
            .args(args)
            .env("HEAPCTL_BACKEND", "standard")
            .env_remove("HEAPCTL_FORMAT")
            .output()
            .expect("Failed to execute heapctl")
    }

    // cargo run -p heapctl -- --format json usage
    #[test]
    fn test_usage_json() {
        let output = heapctl(&["--format", "json", "usage"]);
        assert!(
            output.status.success(),
            "stderr:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );

        let usage: serde_json::Value =
            serde_json::from_slice(&output.stdout).expect("Failed to parse usage JSON");
        assert!(usage["used"].is_u64(), "got: {usage}");
        assert!(usage["total"].is_u64(), "got: {usage}");
    }

    #[test]
    fn test_stats_table() {
        let output = heapctl(&["stats"]);
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        for expected in ["arena", "uordblks", "fordblks", "keepcost"] {
            assert!(
                stdout.contains(expected),
                "Expected:\n{expected}\n\nGot:\n{stdout}",
            );
        }
    }

    #[test]
    fn test_info_prints_xml() {
        let output = heapctl(&["info"]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.starts_with("<malloc"), "Got:\n{stdout}");
    }

    #[test]
    fn test_trim_reports_result() {
        let output = heapctl(&["--format", "json", "trim", "4096"]);
        assert!(output.status.success());
        let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(value["pad"], 4096);
        assert!(value["released"] == 0 || value["released"] == 1);
    }

    #[test]
    fn test_trim_rejects_negative_pad() {
        let output = heapctl(&["trim", "-5"]);
        assert!(!output.status.success());
    }

    #[test]
    fn test_backend_forced_standard() {
        let output = heapctl(&["--format", "json", "backend"]);
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "\"standard\"");

        let ctl = heapctl(&["ctl", "epoch"]);
        assert!(!ctl.status.success());
        let stderr = String::from_utf8_lossy(&ctl.stderr);
        assert!(stderr.contains("not available"), "Got:\n{stderr}");
    }
}
