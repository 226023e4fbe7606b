//! Integration tests for layered configuration resolution
//!
//! These tests verify:
//! - Source precedence across user file, project file, environment, and
//!   explicit file layers
//! - Field-level fall-through for unset values
//! - Aggregated validation reporting
//! - Delivery configuration layering, including the all-or-nothing policy
//!   section

use barque::config::delivery::EMAIL_FILE_NAME;
use barque::config::{
    ConfigResolver, DeliveryConfigLoader, Environment, Overrides, CONFIG_FILE_NAME,
    PROJECT_CONFIG_DIR,
};
use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;

struct Roots {
    _temp: TempDir,
    project: Utf8PathBuf,
    user: Utf8PathBuf,
    home: Utf8PathBuf,
}

fn roots() -> Roots {
    let temp = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
    let roots = Roots {
        project: root.join("project"),
        user: root.join("userconf"),
        home: root.join("home"),
        _temp: temp,
    };
    fs::create_dir_all(&roots.project).unwrap();
    roots
}

fn write_project_config(roots: &Roots, contents: &str) {
    let dir = roots.project.join(PROJECT_CONFIG_DIR);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(CONFIG_FILE_NAME), contents).unwrap();
}

fn write_user_config(roots: &Roots, contents: &str) {
    fs::create_dir_all(&roots.user).unwrap();
    fs::write(roots.user.join(CONFIG_FILE_NAME), contents).unwrap();
}

fn resolver(roots: &Roots) -> ConfigResolver {
    ConfigResolver::with_roots(roots.project.clone(), roots.user.clone())
}

#[test]
fn test_full_precedence_stack() {
    let roots = roots();

    write_user_config(
        &roots,
        "project:\n  name: FromUser\n  author: UserAuthor\nprocessing:\n  workers: 2\n",
    );
    write_project_config(
        &roots,
        "project:\n  name: FromProject\noutput:\n  directory: ./project-out\n",
    );

    let explicit = roots.project.join("explicit.yaml");
    fs::write(&explicit, "math:\n  engine: katex\n").unwrap();

    let env = Environment::from_pairs([("BARQUE_OUTPUT_DIR", "./env-out")]);

    let config = resolver(&roots)
        .resolve(Some(&explicit), &env, &Overrides::default())
        .unwrap();

    // Each field comes from the highest layer that set it.
    assert_eq!(config.project_name, "FromProject"); // project beats user
    assert_eq!(config.project_author, "UserAuthor"); // only user set it
    assert_eq!(config.output_dir.as_str(), "./env-out"); // env beats project
    assert_eq!(config.math_engine, "katex"); // explicit file layer
    assert_eq!(config.workers, 2); // only user set it
    assert_eq!(config.base_font_size, "14px"); // unset everywhere -> default
}

#[test]
fn test_explicit_file_beats_environment() {
    let roots = roots();
    let explicit = roots.project.join("explicit.yaml");
    fs::write(&explicit, "project:\n  name: FromExplicit\n").unwrap();

    let env = Environment::from_pairs([("BARQUE_PROJECT_NAME", "FromEnv")]);

    let config = resolver(&roots)
        .resolve(Some(&explicit), &env, &Overrides::default())
        .unwrap();
    assert_eq!(config.project_name, "FromExplicit");
}

#[test]
fn test_overrides_beat_every_file_layer() {
    let roots = roots();
    write_project_config(&roots, "output:\n  directory: ./from-file\n");

    let overrides = Overrides {
        output_dir: Some(Utf8PathBuf::from("./from-cli")),
        workers: Some(7),
    };
    let config = resolver(&roots)
        .resolve(None, &Environment::default(), &overrides)
        .unwrap();

    assert_eq!(config.output_dir.as_str(), "./from-cli");
    assert_eq!(config.workers, 7);
}

#[test]
fn test_theme_map_overrides_merge_per_key_across_layers() {
    let roots = roots();
    write_user_config(&roots, "light_theme:\n  accent: '#111111'\n  border: '#222222'\n");
    write_project_config(&roots, "light_theme:\n  accent: '#333333'\n");

    let config = resolver(&roots)
        .resolve(None, &Environment::default(), &Overrides::default())
        .unwrap();

    assert_eq!(config.light_theme["accent"], "#333333"); // project wins
    assert_eq!(config.light_theme["border"], "#222222"); // user survives
    assert_eq!(config.light_theme["background"], "#ffffff"); // default survives
}

#[test]
fn test_all_problems_reported_in_one_pass() {
    let roots = roots();
    write_project_config(
        &roots,
        "math:\n  engine: abacus\nprocessing:\n  workers: 0\n",
    );
    let env = Environment::from_pairs([("BARQUE_CREATE_INDEX", "perhaps")]);

    let err = resolver(&roots)
        .resolve(None, &env, &Overrides::default())
        .unwrap_err();

    let messages = err.messages();
    assert!(messages.iter().any(|m| m.contains("BARQUE_CREATE_INDEX")));
    assert!(messages.iter().any(|m| m.contains("math engine")));
    assert!(messages.iter().any(|m| m.contains("Workers")));
    assert!(messages.len() >= 3);
}

#[test]
fn test_malformed_project_yaml_is_reported_not_fatal_midway() {
    let roots = roots();
    write_project_config(&roots, "project: [not, a, mapping\n");

    let err = resolver(&roots)
        .resolve(None, &Environment::default(), &Overrides::default())
        .unwrap_err();
    assert!(err.messages().iter().any(|m| m.contains("parse")));
}

fn delivery_loader(roots: &Roots) -> DeliveryConfigLoader {
    DeliveryConfigLoader::with_roots(
        roots.project.clone(),
        roots.user.clone(),
        Some(roots.home.clone()),
    )
}

#[test]
fn test_delivery_layers_merge_field_level() {
    let roots = roots();

    fs::create_dir_all(&roots.user).unwrap();
    fs::write(
        roots.user.join(EMAIL_FILE_NAME),
        "defaults:\n  from_email: user@example.com\n  signature: sig\n",
    )
    .unwrap();

    let project_dir = roots.project.join(PROJECT_CONFIG_DIR);
    fs::create_dir_all(&project_dir).unwrap();
    fs::write(
        project_dir.join(EMAIL_FILE_NAME),
        "defaults:\n  from_email: project@example.com\n",
    )
    .unwrap();

    let config = delivery_loader(&roots)
        .load(None, &Environment::default())
        .unwrap();

    assert_eq!(
        config.defaults.from_email.as_deref(),
        Some("project@example.com")
    );
    assert_eq!(config.defaults.signature.as_deref(), Some("sig"));
}

#[test]
fn test_delivery_policy_section_is_all_or_nothing() {
    let roots = roots();

    fs::create_dir_all(&roots.user).unwrap();
    fs::write(
        roots.user.join(EMAIL_FILE_NAME),
        "delivery:\n  max_retries: 8\n  max_attachments: 3\n",
    )
    .unwrap();

    let project_dir = roots.project.join(PROJECT_CONFIG_DIR);
    fs::create_dir_all(&project_dir).unwrap();
    fs::write(
        project_dir.join(EMAIL_FILE_NAME),
        "delivery:\n  max_retries: 2\n",
    )
    .unwrap();

    let config = delivery_loader(&roots)
        .load(None, &Environment::default())
        .unwrap();

    // The project layer replaced the whole policy section, so the user
    // layer's max_attachments does not survive; the unset field reverts to
    // its default.
    assert_eq!(config.delivery.max_retries, 2);
    assert_eq!(config.delivery.max_attachments, 10);
}

#[test]
fn test_delivery_env_beats_files() {
    let roots = roots();

    fs::create_dir_all(&roots.user).unwrap();
    fs::write(
        roots.user.join(EMAIL_FILE_NAME),
        "defaults:\n  from_email: file@example.com\n",
    )
    .unwrap();

    let env = Environment::from_pairs([("POP_FROM", "env@example.com")]);
    let config = delivery_loader(&roots).load(None, &env).unwrap();
    assert_eq!(config.defaults.from_email.as_deref(), Some("env@example.com"));
}
