use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn bundle_dts() -> Command {
  assert_cmd::cargo::cargo_bin_cmd!("bundle-dts")
}

const PROGRAM: &str = r#"{
  "files": [{ "path": "src/index.ts", "decl": 0 }],
  "decls": [
    { "kind": "source_file", "symbol": 0, "file": 0, "locals": [1, 2] },
    { "kind": "interface", "symbol": 1, "file": 0, "parent": 0, "body": [" { x: number; }"] },
    { "kind": "type_alias", "symbol": 2, "file": 0, "parent": 0, "body": [" = ", { "ref": 1 }, ";"] }
  ],
  "symbols": [
    { "name": "\"src/index.ts\"", "decls": [0], "exports": [{ "name": "Foo", "symbol": 2 }] },
    { "name": "Bar", "decls": [1] },
    { "name": "Foo", "decls": [2] }
  ]
}"#;

fn setup(config: &str) -> TempDir {
  let dir = tempfile::tempdir().unwrap();
  fs::write(dir.path().join("program.json"), PROGRAM).unwrap();
  fs::write(dir.path().join("config.json"), config).unwrap();
  dir
}

fn paths(dir: &Path) -> [String; 2] {
  [
    dir.join("config.json").display().to_string(),
    dir.join("program.json").display().to_string(),
  ]
}

#[test]
fn writes_grouped_outputs_under_out_dir() {
  let dir = setup(
    r#"{ "input": ["src/index.ts"], "entries": { "lib": "./src/index.ts" }, "output": "types/index.d.ts" }"#,
  );
  let [config, program] = paths(dir.path());
  let out = dir.path().join("out");
  bundle_dts()
    .timeout(Duration::from_secs(10))
    .args(["--config", config.as_str(), "--program", program.as_str(), "--out-dir"])
    .arg(&out)
    .assert()
    .success()
    .code(0);

  let written = fs::read_to_string(out.join("types/index.d.ts")).unwrap();
  assert_eq!(
    written,
    concat!(
      "declare module \"lib\" {\n",
      "  export type Foo = __NE._src_index_Bar;\n",
      "  namespace __NE {\n",
      "    export interface _src_index_Bar { x: number; }\n",
      "  }\n",
      "  export {};\n",
      "}\n",
    )
  );
}

#[test]
fn json_mode_prints_outputs() {
  let dir = setup(
    r#"{ "input": ["src/index.ts"], "entries": { "lib": "./src/index.ts" }, "output": "index.d.ts" }"#,
  );
  let [config, program] = paths(dir.path());
  let assert = bundle_dts()
    .timeout(Duration::from_secs(10))
    .args(["--config", config.as_str(), "--program", program.as_str(), "--json"])
    .assert()
    .success();

  let json: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
  let outputs = json.as_array().expect("array of outputs");
  assert_eq!(outputs.len(), 1);
  assert_eq!(outputs[0]["path"], "index.d.ts");
  assert!(outputs[0]["code"]
    .as_str()
    .unwrap()
    .contains("export type Foo = __NE._src_index_Bar;"));
  assert_eq!(outputs[0]["typeReferencePaths"], Value::Array(vec![]));
}

#[test]
fn configuration_errors_exit_with_failure() {
  let dir = setup(
    r#"{ "input": ["src/index.ts"], "entries": { "lib": "./src/index.ts" }, "groups": [{ "test": "^x$", "path": "x.d.ts" }] }"#,
  );
  let [config, program] = paths(dir.path());
  let assert = bundle_dts()
    .timeout(Duration::from_secs(10))
    .args(["--config", config.as_str(), "--program", program.as_str(), "--json"])
    .assert()
    .failure()
    .code(1);

  assert!(assert.get_output().stdout.is_empty());
  let stderr = String::from_utf8_lossy(&assert.get_output().stderr);
  assert!(stderr.contains("matches no output group"), "got: {stderr}");
}

#[test]
fn missing_program_file_is_reported() {
  let dir = setup(r#"{}"#);
  let config = dir.path().join("config.json");
  let assert = bundle_dts()
    .timeout(Duration::from_secs(10))
    .arg("--config")
    .arg(&config)
    .arg("--program")
    .arg(dir.path().join("missing.json"))
    .assert()
    .failure();
  let stderr = String::from_utf8_lossy(&assert.get_output().stderr);
  assert!(stderr.contains("failed to read"), "got: {stderr}");
}
