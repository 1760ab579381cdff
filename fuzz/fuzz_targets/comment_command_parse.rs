#![no_main]

use libfuzzer_sys::fuzz_target;
use relay_commands::{parse_comment_commands, AuthorAssociation, CommandRegistry};

fuzz_target!(|data: &[u8]| {
    let body = String::from_utf8_lossy(data);
    let mut registry = CommandRegistry::new();
    if registry
        .register("test this", 0_u8)
        .and_then(|registry| registry.register("perf test(?: this)?(?: (\\S+))?", 1_u8))
        .and_then(|registry| registry.register("cherry-?pick (?:this )?(?:in)?to (\\S+)", 2_u8))
        .is_err()
    {
        return;
    }
    let matched = parse_comment_commands(
        &body,
        "@relay-bot",
        AuthorAssociation::Owner,
        true,
        &registry,
    );
    let mut seen = std::collections::HashSet::new();
    for command in &matched {
        assert!(!command.line.trim().is_empty());
        assert!(seen.insert(command.line.clone()));
    }
});
