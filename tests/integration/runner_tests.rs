//! Runner tests: extraction, environment precedence, exit status and cleanup

use super::fixtures::*;
use super::init_test_logging;
use notebook_runner::script::Replace;
use notebook_runner::{Error, RunRequest, RunnerConfig, NotebookRunner};
use std::fs;
use std::num::NonZeroU64;
use std::path::Path;
use tempfile::TempDir;

#[tokio::test]
async fn test_directives_and_markdown_are_not_executed() {
    init_test_logging();
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let notebook = write_notebook(
        data.path(),
        "scenario.ipynb",
        vec![code(&["%magic"]), code(&["x=1", "y=2"]), markdown(&["ignored"])],
    );

    let request = RunRequest::new(&notebook, data.path().join("in"), data.path().join("out"));
    let outcome = sh_runner(&[]).run(request, work.path()).await.unwrap();

    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(outcome.script_lines, 2);
    assert_eq!(outcome.script_path, work.path().join("notebook.sh"));
    assert_eq!(fs::read_to_string(&outcome.script_path).unwrap(), "x=1\ny=2");
}

#[tokio::test]
async fn test_output_directory_is_created() {
    init_test_logging();
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let output = data.path().join("nested").join("deeper").join("out");
    let notebook = write_notebook(
        data.path(),
        "touch.ipynb",
        vec![code(&["touch \"$OUTPUT_DATA_DIR/done\"\n"])],
    );

    let request = RunRequest::new(&notebook, data.path().join("in"), &output);
    sh_runner(&[]).run(request, work.path()).await.unwrap();

    assert!(output.is_dir());
    assert!(output.join("done").exists());
}

#[tokio::test]
async fn test_preset_input_dir_is_left_unchanged() {
    init_test_logging();
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let output = data.path().join("out");
    let notebook = write_notebook(
        data.path(),
        "env.ipynb",
        vec![code(&[
            "echo \"$INPUT_DATA_DIR\" > \"$OUTPUT_DATA_DIR/input.txt\"\n",
            "echo \"$BATCH_SIZE\" > \"$OUTPUT_DATA_DIR/batch.txt\"\n",
        ])],
    );

    let request = RunRequest::new(&notebook, data.path().join("argument-input"), &output)
        .batch_size(NonZeroU64::new(100_000).unwrap());
    let outcome = sh_runner(&[("INPUT_DATA_DIR", "/preset/input")])
        .run(request, work.path())
        .await
        .unwrap();

    assert_eq!(outcome.env.input_data_dir, Path::new("/preset/input"));
    assert_eq!(fs::read_to_string(output.join("input.txt")).unwrap().trim(), "/preset/input");
    assert_eq!(fs::read_to_string(output.join("batch.txt")).unwrap().trim(), "100000");
}

#[tokio::test]
async fn test_preset_output_dir_is_used_and_created() {
    init_test_logging();
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let preset = data.path().join("preset-out");
    let notebook = write_notebook(data.path(), "noop.ipynb", vec![code(&["true"])]);

    let request = RunRequest::new(&notebook, data.path().join("in"), data.path().join("arg-out"));
    let outcome = sh_runner(&[("OUTPUT_DATA_DIR", preset.to_str().unwrap())])
        .run(request, work.path())
        .await
        .unwrap();

    assert_eq!(outcome.env.output_dir(), preset);
    assert!(preset.is_dir());
    assert!(!data.path().join("arg-out").exists());
}

#[tokio::test]
async fn test_failing_script_reports_output_and_keeps_output_dir() {
    init_test_logging();
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let output = data.path().join("out");
    let notebook = write_notebook(
        data.path(),
        "fail.ipynb",
        vec![
            code(&["echo starting training"]),
            code(&["echo something broke >&2", "exit 1"]),
        ],
    );

    let request = RunRequest::new(&notebook, data.path().join("in"), &output).clean_up(true);
    let err = sh_runner(&[]).run(request, work.path()).await.unwrap_err();

    match &err {
        Error::Execution {
            exit_code,
            stdout,
            stderr,
            ..
        } => {
            assert_eq!(*exit_code, Some(1));
            assert!(stdout.contains("starting training"));
            assert!(stderr.contains("something broke"));
        }
        other => panic!("expected execution error, got {:?}", other),
    }
    assert!(err.to_string().contains("something broke"));
    assert!(output.is_dir(), "cleanup must not run after a failure");
}

#[tokio::test]
async fn test_clean_up_removes_output_after_success() {
    init_test_logging();
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let output = data.path().join("out");
    let notebook = write_notebook(
        data.path(),
        "products.ipynb",
        vec![code(&["mkdir -p \"$OUTPUT_DATA_DIR/model\"", "echo weights > \"$OUTPUT_DATA_DIR/model/w\""])],
    );

    let request = RunRequest::new(&notebook, data.path().join("in"), &output).clean_up(true);
    let outcome = sh_runner(&[]).run(request, work.path()).await.unwrap();

    assert!(outcome.cleaned_up);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_repeated_runs_generate_identical_scripts() {
    init_test_logging();
    let data = TempDir::new().unwrap();
    let notebook = write_notebook(
        data.path(),
        "repeat.ipynb",
        vec![code(&["a=1\n", "!ls\n", "b=2\n"]), code(&["echo $a $b"])],
    );

    let mut scripts = Vec::new();
    for _ in 0..2 {
        let work = TempDir::new().unwrap();
        let request = RunRequest::new(&notebook, data.path().join("in"), data.path().join("out"));
        let outcome = sh_runner(&[]).run(request, work.path()).await.unwrap();
        assert_eq!(outcome.stdout.trim(), "1 2");
        scripts.push(fs::read_to_string(&outcome.script_path).unwrap());
    }

    assert_eq!(scripts[0], scripts[1]);
    assert_eq!(scripts[0], "a=1\nb=2\necho $a $b");
}

#[tokio::test]
async fn test_transform_rewrites_lines() {
    init_test_logging();
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let notebook = write_notebook(
        data.path(),
        "transform.ipynb",
        vec![code(&["exit 3  \n"])],
    );

    let request = RunRequest::new(&notebook, data.path().join("in"), data.path().join("out"))
        .transform(Replace::new("exit 3", "exit 0"));
    let outcome = sh_runner(&[]).run(request, work.path()).await.unwrap();

    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(fs::read_to_string(&outcome.script_path).unwrap(), "exit 0");
}

#[tokio::test]
async fn test_malformed_notebook_is_parse_error() {
    init_test_logging();
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let notebook = data.path().join("broken.ipynb");
    fs::write(&notebook, "{\"cells\": [").unwrap();

    let request = RunRequest::new(&notebook, data.path().join("in"), data.path().join("out"));
    let err = sh_runner(&[]).run(request, work.path()).await.unwrap_err();

    assert!(matches!(err, Error::Notebook { .. }));
    assert!(!work.path().join("notebook.sh").exists());
}

#[tokio::test]
async fn test_missing_interpreter_is_spawn_error() {
    init_test_logging();
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let notebook = write_notebook(data.path(), "noop.ipynb", vec![code(&["true"])]);

    let config = RunnerConfig {
        interpreter: "nbrun-test-no-such-interpreter".to_string(),
        ..sh_config()
    };
    let runner = NotebookRunner::new(config)
        .with_env_source(std::collections::HashMap::<String, String>::new());
    let request = RunRequest::new(&notebook, data.path().join("in"), data.path().join("out"));
    let err = runner.run(request, work.path()).await.unwrap_err();

    assert!(matches!(err, Error::Spawn { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn test_non_utf8_output_path_is_created_and_cleaned_up() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    init_test_logging();
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let output = data.path().join(OsStr::from_bytes(b"out-\xff"));
    let notebook = write_notebook(
        data.path(),
        "touch.ipynb",
        vec![code(&["touch \"$OUTPUT_DATA_DIR/done\""])],
    );

    let request = RunRequest::new(&notebook, data.path().join("in"), &output).clean_up(true);
    let outcome = sh_runner(&[]).run(request, work.path()).await.unwrap();

    assert_eq!(outcome.env.output_dir(), output.as_path());
    assert!(outcome.cleaned_up);
    assert!(!output.exists());
    assert_eq!(fs::read_dir(data.path()).unwrap().count(), 1);
}
