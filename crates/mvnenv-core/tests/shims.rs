use std::path::Path;

use mvnenv_core::{ShimError, ShimGenerator, ShimManifest};
use mvnenv_platform::{ShimLayout, ToolPaths};

fn write_template(paths: &ToolPaths, layout: &ShimLayout) {
    std::fs::create_dir_all(&paths.bin_dir).expect("bin dir should be created");
    std::fs::write(paths.dispatcher_template(layout), b"dispatcher-binary")
        .expect("template should be written");
}

fn write_install(paths: &ToolPaths, version: &str, scripts: &[&str]) {
    let bin = paths.version_dir(version).join("bin");
    std::fs::create_dir_all(&bin).expect("bin dir should be created");
    for script in scripts {
        let path = bin.join(script);
        std::fs::write(&path, b"run").expect("script should be written");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("script should be made executable");
        }
    }
}

fn shim_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("shims dir should exist")
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}

#[test]
fn missing_dispatcher_template_is_reported() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    let generator = ShimGenerator::new(ToolPaths::at(temp.path()), ShimLayout::current());

    let error = generator
        .generate_shims()
        .expect_err("generation without template must fail");
    assert!(matches!(error, ShimError::MissingTemplate { .. }));
}

#[cfg(unix)]
#[test]
fn base_and_discovered_commands_get_shim_pairs() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    let paths = ToolPaths::at(temp.path());
    let layout = ShimLayout::unix();
    write_template(&paths, &layout);
    write_install(&paths, "3.9.4", &["mvn", "mvnDebug", "mvnyjp", "m2.conf"]);
    write_install(&paths, "3.9.5", &["mvn", "mvnyjp", "mvnsh"]);
    // Tainted installs contribute nothing.
    write_install(&paths, "4.0.0", &["mvnup"]);

    let commands = ShimGenerator::new(paths.clone(), layout)
        .generate_shims()
        .expect("generation should succeed");

    assert_eq!(commands, vec!["mvn", "mvnDebug", "mvnyjp", "mvnsh"]);
    assert_eq!(
        shim_names(&paths.shims_dir),
        vec![
            "mvn",
            "mvn-shim",
            "mvnDebug",
            "mvnDebug-shim",
            "mvnsh",
            "mvnsh-shim",
            "mvnyjp",
            "mvnyjp-shim",
            "shims.json",
        ]
    );
    assert_eq!(
        std::fs::read(paths.shims_dir.join("mvnyjp-shim")).expect("native copy should exist"),
        b"dispatcher-binary"
    );
    let script =
        std::fs::read_to_string(paths.shims_dir.join("mvnyjp")).expect("script should exist");
    assert!(script.contains("MVNENV_SHIM_COMMAND=mvnyjp"));
    assert!(script.contains("/mvnyjp-shim\" \"$@\""));

    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(paths.shims_dir.join("mvnyjp"))
        .expect("script should exist")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o755);

    let manifest = ShimManifest::load(&paths.shim_manifest_file())
        .expect("manifest should parse")
        .expect("manifest should exist");
    assert_eq!(manifest.commands, commands);
}

#[cfg(unix)]
#[test]
fn commands_gone_from_installs_lose_their_shims() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    let paths = ToolPaths::at(temp.path());
    let layout = ShimLayout::unix();
    write_template(&paths, &layout);
    write_install(&paths, "3.9.4", &["mvn", "mvnyjp"]);
    let generator = ShimGenerator::new(paths.clone(), layout);
    generator.generate_shims().expect("first generation should succeed");
    assert!(paths.shims_dir.join("mvnyjp").exists());

    std::fs::remove_dir_all(paths.version_dir("3.9.4")).expect("install should be removed");
    let commands = generator
        .generate_shims()
        .expect("second generation should succeed");

    assert_eq!(commands, vec!["mvn", "mvnDebug"]);
    assert!(!paths.shims_dir.join("mvnyjp").exists());
    assert!(!paths.shims_dir.join("mvnyjp-shim").exists());
    assert!(paths.shims_dir.join("mvn-shim").exists());
}

#[test]
fn regeneration_replaces_stale_dispatcher_copies() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    let paths = ToolPaths::at(temp.path());
    let layout = ShimLayout::current();
    write_template(&paths, &layout);
    let generator = ShimGenerator::new(paths.clone(), layout);
    generator.generate_shims().expect("first generation should succeed");

    std::fs::write(paths.dispatcher_template(&layout), b"dispatcher-v2")
        .expect("template should be updated");
    generator.generate_shims().expect("second generation should succeed");

    assert_eq!(
        std::fs::read(paths.shims_dir.join(layout.native_name("mvn")))
            .expect("native copy should exist"),
        b"dispatcher-v2"
    );
}
