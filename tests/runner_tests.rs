//! Project generation through the runner and the command line.

use assert_cmd::Command;
use insta::assert_snapshot;
use predicates::prelude::*;
use rstest::rstest;
use test_support::TempProject;
use tsugite::manifest::ProjectManifest;
use tsugite::runner::generate_project;
use tsugite::sink::MemoryWorkspace;

const UTILITIES: &str = concat!(
    "targets:\n",
    "  - name: docs\n",
    "    kind: utility\n",
    "  - name: tools\n",
    "    kind: utility\n",
    "    order_dependencies: [docs]\n",
);

const C_PROJECT: &str = concat!(
    "toolchain:\n",
    "  languages:\n",
    "    C: { compiler: cc, family: gnu, extensions: [c] }\n",
    "targets:\n",
    "  - name: hello\n",
    "    kind: executable\n",
    "    languages: [C]\n",
    "    sources: [src/hello.c]\n",
);

#[rstest]
fn utility_projects_render_phony_edges() {
    let manifest = ProjectManifest::from_str_named(UTILITIES, "tsugite.yml").expect("parse");
    let project =
        generate_project(&manifest, &[], 2, &MemoryWorkspace::new()).expect("generate");
    assert!(project.rules.is_empty());
    assert_snapshot!(project.build_file("rules.ninja".as_ref()), @r"
    ninja_required_version = 1.10

    include rules.ninja

    # Utility target docs
    build docs: phony

    # Utility target tools
    build tools: phony || docs

    build all: phony docs tools

    default all
    ");
}

#[rstest]
fn generate_writes_build_files() {
    let project = TempProject::new();
    project.write("tsugite.yml", C_PROJECT);
    project.write("src/hello.c", "int main(void) { return 0; }\n");

    Command::cargo_bin("tsugite")
        .expect("binary")
        .env_remove("TSUGITE_FORCE_RESPONSE_FILE")
        .args(["-C", project.root().as_str(), "generate", "--compile-commands"])
        .assert()
        .success();

    let build = project.read("build/build.ninja");
    assert!(build.contains("include rules.ninja"));
    assert!(build.contains("build hello: C_EXECUTABLE_LINKER__hello"));
    assert!(project.read("build/rules.ninja").contains("rule C_COMPILER__hello"));
    assert!(project.read("build/compile_commands.json").contains("hello.c"));
}

#[rstest]
fn environment_forces_response_files() {
    let project = TempProject::new();
    project.write("tsugite.yml", C_PROJECT);

    Command::cargo_bin("tsugite")
        .expect("binary")
        .env("TSUGITE_FORCE_RESPONSE_FILE", "true")
        .args(["-C", project.root().as_str(), "generate"])
        .assert()
        .success();

    assert!(project.read("build/rules.ninja").contains("rule C_COMPILER__hello_RSP"));
    assert!(project.read("build/build.ninja").contains("RSP_FILE = "));
}

#[rstest]
fn malformed_environment_settings_fail() {
    let project = TempProject::new();
    project.write("tsugite.yml", C_PROJECT);

    Command::cargo_bin("tsugite")
        .expect("binary")
        .env("TSUGITE_COMMAND_LINE_LIMIT", "lots")
        .args(["-C", project.root().as_str(), "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TSUGITE_* environment"));
}

#[rstest]
fn check_writes_nothing() {
    let project = TempProject::new();
    project.write("tsugite.yml", C_PROJECT);

    Command::cargo_bin("tsugite")
        .expect("binary")
        .args(["-C", project.root().as_str(), "check"])
        .assert()
        .success();
    assert!(!project.exists("build/build.ninja"));
}

#[rstest]
fn missing_manifests_fail() {
    let project = TempProject::new();
    Command::cargo_bin("tsugite")
        .expect("binary")
        .args(["-C", project.root().as_str(), "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no manifest found"));
}

#[rstest]
fn invalid_manifests_fail() {
    let project = TempProject::new();
    project.write("tsugite.yml", "targets:\n  - { name: a, kind: gadget }\n");
    Command::cargo_bin("tsugite")
        .expect("binary")
        .args(["-C", project.root().as_str(), "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse manifest"));
}
