use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cubicle::mainthread::{MainThread, NoopMetrics};
use cubicle::protocol::{FileUpload, InputEvent, TerminalState, UploadFileMessage};
use cubicle::vfs::{FileErrorKind, MINIMUM_FILE_SIZE};
use cubicle::{ComputerEnvironment, ConfigError, CubicleConfig, EnvironmentError};
use tempfile::TempDir;
use uuid::Uuid;

struct Fixture {
    _dir: TempDir,
    main_thread: Arc<MainThread>,
    computer: ComputerEnvironment,
}

fn computer(config: CubicleConfig) -> Fixture {
    let dir = TempDir::new().unwrap();
    let main_thread = MainThread::new(config.main_thread());
    let computer = ComputerEnvironment::new(3, &config, dir.path(), &main_thread, Arc::new(NoopMetrics));
    Fixture {
        _dir: dir,
        main_thread,
        computer,
    }
}

fn read(computer: &ComputerEnvironment, path: &str) -> String {
    let mut contents = String::new();
    computer
        .filesystem()
        .open_for_read(path)
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    contents
}

#[test]
fn config_loads_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cubicle.json");
    std::fs::write(&path, r#"{ "max_main_global_time_ms": 20, "terminal_width": 39 }"#).unwrap();

    let config = CubicleConfig::load(&path).unwrap();
    assert_eq!(config.max_main_global_time_ms, 20);
    assert_eq!(config.terminal_width, 39);
    assert_eq!(config.terminal_height, 19);

    assert!(matches!(
        CubicleConfig::load(dir.path().join("missing.json")),
        Err(ConfigError::Io { .. })
    ));
}

#[test]
fn disk_is_created_lazily_under_the_save_dir() {
    let Fixture { computer, .. } = computer(CubicleConfig::default());
    assert!(computer.root().ends_with("computer/3"));
    assert!(!computer.root().exists());

    let free = computer.filesystem().get_free_space("").unwrap();
    assert_eq!(free, 1_000_000);
    computer.filesystem().make_directory("programs").unwrap();
    assert!(computer.root().join("programs").is_dir());
    assert_eq!(
        computer.filesystem().get_free_space("").unwrap(),
        free - MINIMUM_FILE_SIZE
    );
}

#[test]
fn terminal_matches_config() {
    let config = CubicleConfig {
        terminal_width: 26,
        terminal_height: 20,
        ..Default::default()
    };
    let Fixture { computer, .. } = computer(config);
    assert_eq!(computer.terminal().width(), 26);
    assert_eq!(computer.terminal().height(), 20);

    computer.terminal().write("booting");
    let state = computer.terminal_state(true);
    let mut wire = Vec::new();
    state.encode(&mut wire).unwrap();
    let copy = TerminalState::decode(&mut &wire[..]).unwrap().create().unwrap();
    assert!(copy.get_line(0).unwrap().to_string().starts_with("booting"));
}

#[test]
fn executor_runs_on_the_main_thread() {
    let Fixture {
        computer,
        main_thread,
        ..
    } = computer(CubicleConfig::default());
    let runs = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let runs = runs.clone();
        assert!(computer.executor().enqueue(move || {
            runs.fetch_add(1, Ordering::SeqCst);
        }));
    }

    main_thread.tick();
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert!(!computer.executor().has_work());
}

#[test]
fn closing_a_client_releases_its_input() {
    let Fixture { mut computer, .. } = computer(CubicleConfig::default());
    computer.handle_input(InputEvent::KeyDown { key: 42, repeat: false });
    computer.handle_input(InputEvent::MouseClick { button: 1, x: 2, y: 3 });

    assert_eq!(
        computer.close_client(),
        vec![
            InputEvent::KeyUp { key: 42 },
            InputEvent::MouseUp { button: 1, x: 2, y: 3 },
        ]
    );
    assert!(computer.close_client().is_empty());
}

fn upload(computer: &mut ComputerEnvironment, files: &[FileUpload]) -> Vec<FileUpload> {
    let mut received = None;
    for packet in UploadFileMessage::split(Uuid::new_v4(), files).unwrap() {
        received = computer.receive_upload(packet).unwrap();
    }
    received.unwrap()
}

#[test]
fn uploads_are_saved_to_disk() {
    let Fixture { mut computer, .. } = computer(CubicleConfig::default());
    let files = [
        FileUpload::new("startup.lua", "print('hello')"),
        FileUpload::new("../../escape.lua", "os.shutdown()"),
    ];
    let received = upload(&mut computer, &files);

    let written = computer.save_upload("uploads", &received).unwrap();
    assert_eq!(written, ["uploads/startup.lua", "uploads/escape.lua"]);
    assert_eq!(read(&computer, "uploads/startup.lua"), "print('hello')");
    assert_eq!(read(&computer, "uploads/escape.lua"), "os.shutdown()");
}

#[test]
fn uploads_respect_the_disk_quota() {
    let config = CubicleConfig {
        computer_space_limit: 2_000,
        ..Default::default()
    };
    let Fixture { mut computer, .. } = computer(config);
    let received = upload(&mut computer, &[FileUpload::new("big.bin", vec![1; 5_000])]);

    match computer.save_upload("", &received) {
        Err(EnvironmentError::File(error)) => assert_eq!(error.kind(), Some(FileErrorKind::OutOfSpace)),
        other => panic!("expected out of space, got {other:?}"),
    }
}

#[test]
fn unnamed_uploads_are_refused() {
    let Fixture { computer, .. } = computer(CubicleConfig::default());
    let error = computer
        .save_upload("", &[FileUpload::new("/", "x")])
        .unwrap_err();
    assert!(matches!(
        error,
        EnvironmentError::File(ref e) if e.kind() == Some(FileErrorKind::AccessDenied)
    ));
}
