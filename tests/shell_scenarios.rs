use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cross_terminal::core::config::ShellConfig;
use cross_terminal::process::{CompletionCallback, OutputCallback};
use cross_terminal::{Environment, ExecutionOptions, ProcessState, Shell};
use parking_lot::Mutex;
use serial_test::serial;

fn shell() -> Shell {
    let environment = Environment::new();
    environment.set("PATH", "/usr/bin:/bin").unwrap();
    Shell::with_config(ShellConfig::default(), environment)
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    done()
}

#[test]
fn echo_completes_with_zero() {
    let info = shell().execute_sync("echo hello", &ExecutionOptions::default());
    assert_eq!(info.state, ProcessState::Completed);
    assert_eq!(info.exit_code, 0);
}

#[test]
fn failed_cd_leaves_directory_alone() {
    let shell = shell();
    let before = shell.get_current_directory();

    let info = shell.execute_sync("cd /nonexistent-path-xyz", &ExecutionOptions::default());

    assert_eq!(info.state, ProcessState::Failed);
    assert_eq!(info.exit_code, 1);
    assert_eq!(shell.get_current_directory(), before);
}

#[test]
fn forced_terminate_ends_sleep() {
    let shell = shell();
    let pid = shell.execute_async("sleep 5", &ExecutionOptions::default(), None, None);
    assert!(pid > 0);

    assert!(shell.terminate_process(pid, true));
    assert_ne!(shell.get_process_info(pid).state, ProcessState::Running);
    assert!(wait_until(Duration::from_secs(2), || {
        shell.get_process_info(pid).state == ProcessState::Terminated
    }));
}

#[test]
fn kill_builtin_terminates_target() {
    let shell = shell();
    let pid = shell.execute_async("sleep 5", &ExecutionOptions::default(), None, None);
    assert!(pid > 0);

    let info = shell.execute_sync(&format!("kill {pid}"), &ExecutionOptions::default());
    assert_eq!(info.state, ProcessState::Completed);

    assert!(wait_until(Duration::from_secs(2), || {
        shell.get_process_info(pid).is_terminal()
    }));

    let missing = shell.execute_sync("kill 999999", &ExecutionOptions::default());
    assert_eq!(missing.exit_code, 1);
    let garbage = shell.execute_sync("kill abc", &ExecutionOptions::default());
    assert_eq!(garbage.exit_code, 1);
}

#[test]
fn concurrent_async_processes_stay_separate() {
    let shell = shell();
    let first_out = Arc::new(Mutex::new(Vec::<u8>::new()));
    let second_out = Arc::new(Mutex::new(Vec::<u8>::new()));
    let completions = Arc::new(AtomicUsize::new(0));

    let callbacks = |sink: &Arc<Mutex<Vec<u8>>>| -> (OutputCallback, CompletionCallback) {
        let sink = Arc::clone(sink);
        let done = Arc::clone(&completions);
        let output: OutputCallback =
            Arc::new(move |bytes: &[u8], _is_error: bool| sink.lock().extend_from_slice(bytes));
        let completion: CompletionCallback = Arc::new(move |_info: &cross_terminal::ProcessInfo| {
            done.fetch_add(1, Ordering::SeqCst);
        });
        (output, completion)
    };

    let (out_a, done_a) = callbacks(&first_out);
    let (out_b, done_b) = callbacks(&second_out);
    let options = ExecutionOptions::default();
    let first = shell.execute_async("printf aaaa", &options, Some(out_a), Some(done_a));
    let second = shell.execute_async("printf bbbb", &options, Some(out_b), Some(done_b));

    assert!(first > 0 && second > 0);
    assert_ne!(first, second);

    assert!(wait_until(Duration::from_secs(5), || {
        completions.load(Ordering::SeqCst) == 2
    }));
    assert_eq!(first_out.lock().as_slice(), b"aaaa");
    assert_eq!(second_out.lock().as_slice(), b"bbbb");
    assert_eq!(shell.get_process_info(first).state, ProcessState::Completed);
    assert_eq!(shell.get_process_info(second).state, ProcessState::Completed);
}

#[test]
fn async_process_reaches_terminal_state() {
    let shell = shell();
    let pid = shell.execute_async("sh -c 'exit 3'", &ExecutionOptions::default(), None, None);
    assert!(pid > 0);

    assert!(wait_until(Duration::from_secs(5), || {
        shell.get_process_info(pid).is_terminal()
    }));
    let info = shell.get_process_info(pid);
    assert_eq!(info.state, ProcessState::Failed);
    assert_eq!(info.exit_code, 3);
}

#[test]
fn timeout_kills_long_process() {
    let shell = shell();
    let options = ExecutionOptions::new().with_timeout(100);
    let started = Instant::now();

    let info = shell.execute_sync("sleep 10", &options);

    assert_eq!(info.state, ProcessState::Terminated);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn working_directory_option_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let options = ExecutionOptions::new().with_working_directory(dir.path());

    let info = shell().execute_sync("/bin/pwd", &options);

    assert_eq!(
        info.output.trim(),
        dir.path().to_string_lossy().trim_end_matches('/')
    );
}

#[test]
fn export_is_visible_to_children() {
    let shell = shell();
    shell.execute_sync("export GREETING=hi", &ExecutionOptions::default());

    let info = shell.execute_sync("sh -c 'printf $GREETING'", &ExecutionOptions::default());
    assert_eq!(info.output, "hi");
}

#[test]
#[serial]
fn environment_round_trips_through_system() {
    let exported = Environment::new();
    exported.set("CROSS_TERMINAL_ROUND_TRIP", "Mixed Case Value").unwrap();
    exported.set("cross_terminal_lower", "lower").unwrap();
    exported.export_to_system();

    let imported = Environment::new();
    imported.import_from_system();
    assert_eq!(
        imported.get("CROSS_TERMINAL_ROUND_TRIP").as_deref(),
        Some("Mixed Case Value")
    );
    assert_eq!(imported.get("cross_terminal_lower").as_deref(), Some("lower"));

    std::env::remove_var("CROSS_TERMINAL_ROUND_TRIP");
    std::env::remove_var("cross_terminal_lower");
}
