#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, sync_channel};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use freshen::build::{kill_channel, BuildResult, KillSwitch};
use freshen::config::{Config, ConfigBuilder};
use freshen::error::Error;
use freshen::event::{OpKind, Trigger, WatchEvent};
use freshen::orchestrator::{Message, Orchestrator};

struct Project {
    _dir: tempfile::TempDir,
    root: PathBuf,
    orchestrator: Orchestrator,
    kill: KillSwitch,
    building: Arc<AtomicBool>,
}

/// A stand-in for `go build`: records its arguments, sleeps while `slow`
/// exists, fails while `fail` exists, otherwise writes a target that
/// records its pid and then idles.
fn fake_build_tool(root: &Path) -> PathBuf {
    let path = root.join("fake-go");
    let root = root.display();
    let script = format!(
        r#"#!/bin/sh
echo "$@" >> '{root}/builds.log'
if [ -e '{root}/slow' ]; then sleep 30; fi
if [ -e '{root}/fail' ]; then
    echo "main.go:1:1: expected 'package', found 'EOF'" >&2
    exit 1
fi
printf '#!/bin/sh\necho $$ >> "%s"\nexec sleep 30\n' '{root}/runs.log' > "$3"
chmod +x "$3"
"#,
        root = root
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn config(root: &Path, build_delay: Duration) -> Config {
    let tool = fake_build_tool(root);

    ConfigBuilder::default()
        .working_dir(root)
        .temp_dir(root.join("tmp"))
        .build_tool(tool.to_string_lossy().into_owned())
        .build_delay(build_delay)
        .tags("dev")
        .build()
        .unwrap()
}

fn lines(root: &Path, name: &str) -> Vec<String> {
    fs::read_to_string(root.join(name))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Waits up to five seconds for `name` to have at least `count` lines.
fn wait_for_lines(root: &Path, name: &str, count: usize) -> Vec<String> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let found = lines(root, name);
        if found.len() >= count || Instant::now() > deadline {
            return found;
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn project() -> Project {
    project_with_delay(Duration::from_millis(10))
}

fn project_with_delay(build_delay: Duration) -> Project {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let config = config(&root, build_delay);
    fs::create_dir_all(&config.temp_dir).unwrap();

    let (kill, requests) = kill_channel();
    let building = Arc::new(AtomicBool::new(false));
    let orchestrator = Orchestrator::new(Arc::new(config), requests, building.clone());

    Project {
        _dir: dir,
        root,
        orchestrator,
        kill,
        building,
    }
}

impl Project {
    fn lines(&self, name: &str) -> Vec<String> {
        lines(&self.root, name)
    }

    /// Waits for the target binary to have recorded `count` starts.
    fn runs(&self, count: usize) -> Vec<u32> {
        pids(&self.root, count)
    }

    fn error_log(&self) -> PathBuf {
        self.root.join("tmp").join("freshen-build-errors.log")
    }

    fn touch(&self, name: &str) {
        fs::write(self.root.join(name), "").unwrap();
    }

    fn trigger(&self, name: &str) -> Trigger {
        Trigger::from(WatchEvent::new(&self.root.join(name), OpKind::Write))
    }

    fn startup(&mut self) -> BuildResult {
        let trigger = Trigger::startup(&self.root);
        self.orchestrator.handle(&trigger).unwrap()
    }
}

fn pids(root: &Path, count: usize) -> Vec<u32> {
    wait_for_lines(root, "runs.log", count)
        .iter()
        .map(|pid| pid.parse().unwrap())
        .collect()
}

fn is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[test]
fn startup_builds_and_runs_once() {
    let mut p = project();

    assert_eq!(p.startup(), BuildResult::Succeeded);
    assert!(!p.building.load(Ordering::SeqCst));

    let builds = p.lines("builds.log");
    assert_eq!(builds.len(), 1);
    assert!(builds[0].starts_with("build -o "));
    assert!(builds[0].ends_with("-tags dev ."));

    let runs = p.runs(1);
    assert_eq!(runs.len(), 1);
    assert_eq!(p.orchestrator.supervisor().pid(), Some(runs[0]));
}

#[test]
fn template_change_reruns_without_building() {
    let mut p = project();
    p.startup();
    fs::write(p.error_log(), "left from earlier").unwrap();

    let html = p.trigger("templates/index.html");
    assert_eq!(p.orchestrator.handle(&html).unwrap(), BuildResult::Succeeded);

    assert_eq!(p.lines("builds.log").len(), 1);
    assert_eq!(p.runs(2).len(), 2);
    assert!(p.error_log().exists());
}

#[test]
fn only_one_instance_survives_a_rerun() {
    let mut p = project();
    p.startup();
    let main = p.trigger("main.go");
    p.orchestrator.handle(&main).unwrap();

    let runs = p.runs(2);
    assert_eq!(runs.len(), 2);
    assert!(!is_alive(runs[0]));
    assert!(is_alive(runs[1]));
    assert_eq!(p.lines("builds.log").len(), 2);
}

#[test]
fn kill_request_cuts_the_build_short() {
    let mut p = project();
    p.touch("slow");

    let kill = p.kill.clone();
    let requester = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        kill.request();
    });

    let started = Instant::now();
    let trigger = p.trigger("main.go");
    assert_eq!(p.orchestrator.handle(&trigger).unwrap(), BuildResult::Killed);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!p.building.load(Ordering::SeqCst));
    assert!(!p.orchestrator.supervisor().is_running());

    requester.join().unwrap();
}

#[test]
fn stale_kill_request_is_ignored() {
    let mut p = project();
    p.kill.request();

    assert_eq!(p.startup(), BuildResult::Succeeded);
}

#[test]
fn first_build_failure_is_fatal() {
    let mut p = project();
    p.touch("fail");

    let trigger = Trigger::startup(&p.root);
    match p.orchestrator.handle(&trigger) {
        Err(Error::BuildFailed(output)) => assert!(output.contains("expected 'package'")),
        other => panic!("unexpected {:?}", other),
    }
    assert!(p.error_log().exists());
    assert!(p.runs(0).is_empty());
}

#[test]
fn later_failure_keeps_the_previous_binary() {
    let mut p = project();
    p.startup();
    let first = p.runs(1)[0];

    p.touch("fail");
    let main = p.trigger("main.go");
    match p.orchestrator.handle(&main).unwrap() {
        BuildResult::Failed(output) => assert!(output.contains("expected 'package'")),
        other => panic!("unexpected {:?}", other),
    }

    let log = fs::read_to_string(p.error_log()).unwrap();
    assert!(log.contains("expected 'package'"));
    assert!(is_alive(first));
    assert_eq!(p.orchestrator.supervisor().pid(), Some(first));

    // the next good build clears the log again
    fs::remove_file(p.root.join("fail")).unwrap();
    assert_eq!(p.orchestrator.handle(&main).unwrap(), BuildResult::Succeeded);
    assert!(!p.error_log().exists());
    assert!(!is_alive(first));
}

#[test]
fn shutdown_during_the_build_delay_skips_the_build() {
    let p = project_with_delay(Duration::from_millis(300));
    p.touch("slow");

    let (tx, rx) = sync_channel(1);
    let shutdown = p.orchestrator.shutdown_handle(tx.clone(), p.kill.clone());
    tx.send(Message::Trigger(Trigger::startup(&p.root))).unwrap();

    let Project {
        _dir, root, orchestrator, ..
    } = p;
    let started = Instant::now();
    let cycle = thread::spawn(move || orchestrator.run(rx));

    thread::sleep(Duration::from_millis(100));
    shutdown.request();

    assert!(cycle.join().unwrap().is_ok());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(lines(&root, "builds.log").is_empty());
    assert!(lines(&root, "runs.log").is_empty());
}

#[test]
fn shutdown_during_a_build_kills_it() {
    let p = project();
    p.touch("slow");

    let (tx, rx) = sync_channel(1);
    let shutdown = p.orchestrator.shutdown_handle(tx.clone(), p.kill.clone());
    tx.send(Message::Trigger(Trigger::startup(&p.root))).unwrap();

    let Project {
        _dir, root, orchestrator, ..
    } = p;
    let started = Instant::now();
    let cycle = thread::spawn(move || orchestrator.run(rx));

    assert_eq!(wait_for_lines(&root, "builds.log", 1).len(), 1);
    shutdown.request();

    assert!(cycle.join().unwrap().is_ok());
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(lines(&root, "runs.log").is_empty());
}

#[test]
fn run_builds_at_startup_and_on_each_change() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::create_dir_all(root.join("cmd")).unwrap();
    let config = config(&root, Duration::from_millis(10));

    let (handles, handle) = channel();
    let cycle = thread::spawn(move || {
        freshen::run::run_with(config, move |shutdown| {
            handles.send(shutdown).unwrap();
            Ok(())
        })
    });
    let shutdown = handle.recv_timeout(Duration::from_secs(5)).unwrap();

    // no file changed: exactly one build and one run
    let first = pids(&root, 1);
    assert_eq!(first.len(), 1);
    thread::sleep(Duration::from_millis(200));
    assert_eq!(lines(&root, "builds.log").len(), 1);
    assert_eq!(lines(&root, "runs.log").len(), 1);
    assert!(root.join("tmp").is_dir());

    // ignored: wrong extension, and inside the temp dir
    fs::write(root.join("notes.txt"), "todo").unwrap();
    fs::write(root.join("tmp").join("gen.go"), "package gen\n").unwrap();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(lines(&root, "builds.log").len(), 1);

    fs::write(root.join("cmd").join("main.go"), "package main\n").unwrap();
    let runs = pids(&root, 2);
    assert_eq!(runs.len(), 2);
    assert_eq!(lines(&root, "builds.log").len(), 2);
    assert!(!is_alive(runs[0]));

    shutdown.request();
    assert!(cycle.join().unwrap().is_ok());
    assert!(!is_alive(runs[1]));
}
