// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{init_remote, output, Harness, MockManager};

use venvman::{config::ConfigError, repo::Git2Cloner, ProvisionError, Provisioner};

use anyhow::Result;
use indoc::{formatdoc, indoc};
use pretty_assertions::assert_eq;
use std::fs;

const COURSE: &str = indoc! {r#"
    default_packages: [numpy]
    environments:
      Kyle: [pandas]
      Sally:
"#};

const PAIR: &str = indoc! {r#"
    environments:
      Kyle: []
      Sally: []
"#};

#[test]
fn create_envs_installs_defaults_first() -> Result<()> {
    let harness = Harness::new(COURSE)?;
    let mut provisioner = harness.provisioner(MockManager::default());
    provisioner.create_envs()?;

    let expect = indoc! {r#"
        Creating env Kyle
        Installing package numpy
        Installing package pandas
        Creating env Sally
        Installing package numpy
        Created envs ['Kyle', 'Sally']
    "#};
    assert_eq!(output(provisioner.output()), expect);

    let expect = vec![
        "create Kyle",
        "install Kyle numpy",
        "install Kyle pandas",
        "create Sally",
        "install Sally numpy",
    ];
    assert_eq!(provisioner.manager().calls(), expect);
    assert!(harness.envs_root().join("Kyle").is_dir());
    assert!(harness.envs_root().join("Sally").is_dir());

    Ok(())
}

#[test]
fn create_envs_refuses_existing_environment() -> Result<()> {
    let harness = Harness::new(COURSE)?;
    harness.provisioner(MockManager::default()).create_envs()?;

    let mut provisioner = harness.provisioner(MockManager::default());
    let result = provisioner.create_envs();
    assert!(matches!(
        result,
        Err(ProvisionError::EnvironmentExists { ref name, .. }) if name == "Kyle"
    ));
    assert_eq!(output(provisioner.output()), "Creating env Kyle\n");
    assert!(provisioner.manager().calls().is_empty());

    Ok(())
}

#[test]
fn create_envs_stops_at_first_failure() -> Result<()> {
    let harness = Harness::new(COURSE)?;
    let manager = MockManager::default().failing_on("Kyle", "pandas");
    let mut provisioner = harness.provisioner(manager);

    let result = provisioner.create_envs();
    assert!(matches!(result, Err(ProvisionError::Package(_))));
    assert!(!harness.envs_root().join("Sally").exists());
    assert!(!output(provisioner.output()).contains("Created envs"));

    Ok(())
}

#[test]
fn create_kernels_installs_kernel_support_when_missing() -> Result<()> {
    let harness = Harness::new(PAIR)?;
    let manager = MockManager::default().with_installed("Sally", "ipykernel");
    let mut provisioner = harness.provisioner(manager);
    provisioner.create_kernels(false)?;

    let expect = indoc! {r#"
        Creating jupyter kernel for Kyle
        Creating jupyter kernel for Sally
    "#};
    assert_eq!(output(provisioner.output()), expect);

    let kyle = harness.env("Kyle").python();
    let sally = harness.env("Sally").python();
    let expect = vec![
        "is-installed Kyle ipykernel".to_string(),
        "install Kyle ipykernel".to_string(),
        format!(
            "execute Kyle {} -m ipykernel install --name=Kyle",
            kyle.display()
        ),
        "is-installed Sally ipykernel".to_string(),
        format!(
            "execute Sally {} -m ipykernel install --name=Sally",
            sally.display()
        ),
    ];
    assert_eq!(provisioner.manager().calls(), expect);

    Ok(())
}

#[test]
fn create_kernels_through_sudo() -> Result<()> {
    let harness = Harness::new(PAIR)?;
    let manager = MockManager::default()
        .with_installed("Kyle", "ipykernel")
        .with_installed("Sally", "ipykernel");
    let mut provisioner = harness.provisioner(manager);
    provisioner.create_kernels(true)?;

    let executed = provisioner
        .manager()
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("execute"))
        .collect::<Vec<_>>();
    assert_eq!(executed.len(), 2);
    assert!(executed[0].starts_with("execute Kyle sudo "));
    assert!(executed[1].starts_with("execute Sally sudo "));

    Ok(())
}

#[test]
fn create_dirs_copies_directory_contents() -> Result<()> {
    let harness = Harness::new(PAIR)?;
    let source = harness.path().join("test_copy_dir");
    fs::create_dir(&source)?;
    fs::write(source.join("test_file.txt"), "hello")?;

    let mut provisioner = harness.provisioner(MockManager::default());
    provisioner.create_dirs(Some(&source))?;

    let expect = indoc! {r#"
        Creating dir for Kyle
        Copying test_copy_dir to Kyle
        Creating dir for Sally
        Copying test_copy_dir to Sally
    "#};
    assert_eq!(output(provisioner.output()), expect);
    for name in ["Kyle", "Sally"] {
        let copied = harness.projs_root().join(name).join("test_file.txt");
        assert_eq!(fs::read_to_string(copied)?, "hello");
    }

    Ok(())
}

#[test]
fn create_dirs_copies_single_file() -> Result<()> {
    let harness = Harness::new(PAIR)?;
    let source = harness.path().join("notes.md");
    fs::write(&source, "# Notes")?;

    let mut provisioner = harness.provisioner(MockManager::default());
    provisioner.create_dirs(Some(&source))?;

    let expect = indoc! {r#"
        Creating dir for Kyle
        Copying notes.md to Kyle
        Creating dir for Sally
        Copying notes.md to Sally
    "#};
    assert_eq!(output(provisioner.output()), expect);
    assert_eq!(
        fs::read_to_string(harness.projs_root().join("Sally").join("notes.md"))?,
        "# Notes"
    );

    Ok(())
}

#[test]
fn create_dirs_skips_existing_directories() -> Result<()> {
    let harness = Harness::new(PAIR)?;
    harness.provisioner(MockManager::default()).create_dirs(None)?;
    fs::write(harness.projs_root().join("Kyle").join("work.py"), "print()")?;

    let mut provisioner = harness.provisioner(MockManager::default());
    provisioner.create_dirs(None)?;

    let expect = indoc! {r#"
        Creating dir for Kyle
        Dir already exists for Kyle, skipping
        Creating dir for Sally
        Dir already exists for Sally, skipping
    "#};
    assert_eq!(output(provisioner.output()), expect);
    assert_eq!(
        fs::read_to_string(harness.projs_root().join("Kyle").join("work.py"))?,
        "print()"
    );

    Ok(())
}

#[test]
fn create_dirs_never_copies_over_existing_directories() -> Result<()> {
    let harness = Harness::new(PAIR)?;
    let source = harness.path().join("test_copy_dir");
    fs::create_dir(&source)?;
    fs::write(source.join("test_file.txt"), "first")?;
    harness
        .provisioner(MockManager::default())
        .create_dirs(Some(&source))?;

    fs::write(source.join("test_file.txt"), "second")?;
    fs::write(source.join("extra.txt"), "extra")?;
    let mut provisioner = harness.provisioner(MockManager::default());
    provisioner.create_dirs(Some(&source))?;

    let expect = indoc! {r#"
        Creating dir for Kyle
        Dir already exists for Kyle, skipping
        Creating dir for Sally
        Dir already exists for Sally, skipping
    "#};
    assert_eq!(output(provisioner.output()), expect);
    for name in ["Kyle", "Sally"] {
        let dest = harness.projs_root().join(name);
        assert_eq!(fs::read_to_string(dest.join("test_file.txt"))?, "first");
        assert!(!dest.join("extra.txt").exists());
    }

    Ok(())
}

#[test]
fn create_dirs_rejects_source_holding_projects_root() -> Result<()> {
    let harness = Harness::new(PAIR)?;
    fs::write(harness.path().join("notes.md"), "# Notes")?;

    let mut provisioner = harness.provisioner(MockManager::default());
    let result = provisioner.create_dirs(Some(harness.path()));
    assert!(matches!(result, Err(ProvisionError::FileSystem { .. })));
    assert!(output(provisioner.output()).is_empty());
    assert!(!harness.projs_root().join("Kyle").exists());

    let result = provisioner.create_dirs(Some(harness.projs_root()));
    assert!(matches!(result, Err(ProvisionError::FileSystem { .. })));
    assert!(!harness.projs_root().join("Sally").exists());

    Ok(())
}

#[test]
fn create_dirs_rejects_missing_source() -> Result<()> {
    let harness = Harness::new(PAIR)?;
    let mut provisioner = harness.provisioner(MockManager::default());

    let result = provisioner.create_dirs(Some(&harness.path().join("nope")));
    assert!(matches!(result, Err(ProvisionError::FileSystem { .. })));
    assert!(!harness.projs_root().join("Kyle").exists());
    assert!(output(provisioner.output()).is_empty());

    Ok(())
}

#[test]
fn install_pkgs_visits_every_environment() -> Result<()> {
    let harness = Harness::new(PAIR)?;
    let mut provisioner = harness.provisioner(MockManager::default());
    provisioner.install_pkgs(&["flake8".into(), "black".into()])?;

    let expect = indoc! {r#"
        Installing ['flake8', 'black'] in Kyle
        Installing ['flake8', 'black'] in Sally
    "#};
    assert_eq!(output(provisioner.output()), expect);

    let expect = vec![
        "install Kyle flake8",
        "install Kyle black",
        "install Sally flake8",
        "install Sally black",
    ];
    assert_eq!(provisioner.manager().calls(), expect);

    Ok(())
}

#[test]
fn install_pkgs_stops_at_first_failure() -> Result<()> {
    let harness = Harness::new(PAIR)?;
    let manager = MockManager::default().failing_on("Kyle", "black");
    let mut provisioner = harness.provisioner(manager);

    let result = provisioner.install_pkgs(&["flake8".into(), "black".into()]);
    assert!(matches!(result, Err(ProvisionError::Package(_))));
    assert_eq!(
        output(provisioner.output()),
        "Installing ['flake8', 'black'] in Kyle\n"
    );
    assert_eq!(
        provisioner.manager().calls(),
        vec!["install Kyle flake8", "install Kyle black"]
    );

    Ok(())
}

#[test]
fn uninstall_and_upgrade_pkgs_report_their_action() -> Result<()> {
    let harness = Harness::new(PAIR)?;
    let mut provisioner = harness.provisioner(MockManager::default());
    provisioner.uninstall_pkgs(&["flake8".into()])?;
    provisioner.upgrade_pkgs(&["numpy>=1.26".into()])?;

    let expect = indoc! {r#"
        Uninstalling ['flake8'] in Kyle
        Uninstalling ['flake8'] in Sally
        Upgrading ['numpy>=1.26'] in Kyle
        Upgrading ['numpy>=1.26'] in Sally
    "#};
    assert_eq!(output(provisioner.output()), expect);

    let expect = vec![
        "uninstall Kyle flake8",
        "uninstall Sally flake8",
        "upgrade Kyle numpy>=1.26",
        "upgrade Sally numpy>=1.26",
    ];
    assert_eq!(provisioner.manager().calls(), expect);

    Ok(())
}

#[test]
fn install_source_continues_past_failure() -> Result<()> {
    let harness = Harness::new(indoc! {r#"
        environments:
          Sally: []
          Kyle: []
          Bob: []
    "#})?;
    let sally = harness.projs_root().join("Sally");
    let kyle = harness.projs_root().join("Kyle");
    fs::create_dir_all(&sally)?;
    fs::create_dir_all(&kyle)?;
    fs::create_dir_all(harness.projs_root().join("Bob"))?;
    fs::write(sally.join("setup.py"), "")?;
    fs::write(kyle.join("pyproject.toml"), "")?;

    let manager = MockManager::default().failing_on("Sally", &sally.display().to_string());
    let mut provisioner = harness.provisioner(manager);
    provisioner.install_source()?;

    let expect = indoc! {r#"
        Installing project source for Sally
        Installing project source for Kyle
    "#};
    assert_eq!(output(provisioner.output()), expect);

    let expect = vec![
        format!("install-editable Sally {}", sally.display()),
        format!("install-editable Kyle {}", kyle.display()),
    ];
    assert_eq!(provisioner.manager().calls(), expect);

    Ok(())
}

#[test]
fn create_repos_requires_remote() -> Result<()> {
    let harness = Harness::new(PAIR)?;
    let mut provisioner = harness.provisioner(MockManager::default());

    let result = provisioner.create_repos();
    assert!(matches!(
        result,
        Err(ProvisionError::Config(ConfigError::MissingRepositoryRemote))
    ));
    assert!(provisioner.cloner().clones().is_empty());

    Ok(())
}

#[test]
fn create_repos_skips_existing_project_directories() -> Result<()> {
    let harness = Harness::new(&format!(
        "repository_remote: https://example.com/course/\n{PAIR}"
    ))?;
    fs::create_dir_all(harness.projs_root().join("Kyle"))?;

    let mut provisioner = harness.provisioner(MockManager::default());
    provisioner.create_repos()?;

    let sally = harness.projs_root().join("Sally");
    assert_eq!(
        output(provisioner.output()),
        format!("Cloning repo for {}\n", sally.display())
    );
    assert_eq!(
        provisioner.cloner().clones(),
        vec![("https://example.com/course/Sally.git".to_string(), sally)]
    );

    Ok(())
}

#[test]
fn create_repos_clones_through_libgit2() -> Result<()> {
    let remote = tempfile::tempdir()?;
    init_remote(&remote.path().join("Kyle.git"), "README.md", "# Kyle's project")?;

    let harness = Harness::new(&formatdoc!(
        r#"
            repository_remote: '{}'
            environments:
              Kyle: []
        "#,
        remote.path().display()
    ))?;
    let mut provisioner = Provisioner::new(
        harness.workspace(),
        MockManager::default(),
        Git2Cloner,
        Vec::new(),
    );
    provisioner.create_repos()?;

    let readme = harness.projs_root().join("Kyle").join("README.md");
    assert_eq!(fs::read_to_string(readme)?, "# Kyle's project");

    Ok(())
}
