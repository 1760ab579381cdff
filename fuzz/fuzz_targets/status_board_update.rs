#![no_main]

use libfuzzer_sys::fuzz_target;
use relay_commands::{apply_run_updates, render_status_board, Run, StatusBoardRow};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let board = render_status_board(
        "octocat",
        &[StatusBoardRow {
            command: &text,
            distinct_id: "0123456789abcdef",
        }],
    );
    let runs = [Run::errored("0123456789abcdef", "handler failed")];
    let once = apply_run_updates(&board, &runs).unwrap_or(board);
    assert!(apply_run_updates(&once, &runs).is_none());
});
