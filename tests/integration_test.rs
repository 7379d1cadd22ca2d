use nginx_agent::{
    AccessLineParser, ErrorLineClassifier, ErrorLogLevel, FieldValue, LogFormatCompiler,
    NginxConfig,
};
use nginx_agent_log::errorlog::UPSTREAM_RESPONSE_BUFFERED;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn fixtures_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
        .join("nginx.conf")
}

fn parse_fixture(name: &str, prefix: &Path) -> NginxConfig {
    let mut config = NginxConfig::new(fixtures_path(name), prefix);
    config.full_parse();
    config
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_full_fixture_files() {
    let prefix = TempDir::new().unwrap();
    let config = parse_fixture("full", prefix.path());
    let output = config.load_output();
    let dir = fixtures_path("full").parent().unwrap().to_path_buf();

    assert!(output.errors.is_empty(), "{:?}", config.parser_errors());
    let files: Vec<&PathBuf> = output.files.keys().collect();
    assert_eq!(
        files,
        vec![
            &dir.join("conf.d/default.conf"),
            &dir.join("conf.d/disabled.conf"),
            &dir.join("conf.d/ssl.conf"),
            &dir.join("mime.types"),
            &dir.join("nginx.conf"),
        ]
    );
    assert!(output.files.values().all(|file| !file.broken));
    assert_eq!(output.files[&dir.join("conf.d/disabled.conf")].lines, 3);
    assert!(output.directories.contains_key(&dir));
    assert!(output.directories.contains_key(&dir.join("conf.d")));

    let expected: u64 = output
        .files
        .keys()
        .map(|path| fs::metadata(path).unwrap().len())
        .sum();
    assert_eq!(config.total_size(), expected);
}

#[test]
fn test_full_fixture_summary() {
    let prefix = TempDir::new().unwrap();
    let config = parse_fixture("full", prefix.path());
    let summary = config.summary();
    let dir = fixtures_path("full").parent().unwrap().to_path_buf();

    assert_eq!(
        summary.log_formats["main"],
        "$remote_addr - $remote_user [$time_local] \"$request\" \
         $status $body_bytes_sent \"$http_referer\" \
         \"$http_user_agent\" $request_time $upstream_response_time"
    );

    assert_eq!(summary.access_logs.len(), 2);
    assert_eq!(
        summary.access_logs["/var/log/nginx/access.log"].as_deref(),
        Some("main")
    );
    assert_eq!(summary.access_logs["/var/log/nginx/ssl_access.log"], None);

    let error_log = prefix.path().join("logs/error.log").display().to_string();
    assert_eq!(summary.error_logs.len(), 1);
    assert_eq!(summary.error_logs[&error_log], ErrorLogLevel::Warn);

    assert_eq!(
        summary.stub_status_urls,
        vec!["127.0.0.1:80/basic_status", "[::1]:80/basic_status"]
    );
    assert_eq!(
        summary.plus_status_external_urls,
        vec!["secure.example.com:443/api"]
    );
    assert_eq!(summary.plus_status_internal_urls, vec!["127.0.0.1:443/api"]);
    assert_eq!(summary.ssl_certificates, vec![dir.join("certs/example.crt")]);
}

#[test]
fn test_full_fixture_tree() {
    let prefix = TempDir::new().unwrap();
    let config = parse_fixture("full", prefix.path());

    let simple = config.simplify();
    assert_eq!(
        simple.get("worker_processes").and_then(|v| v.as_text()),
        Some("auto")
    );
    assert!(simple.get("http").and_then(|http| http.get("upstream")).is_some());

    let handle = config
        .tree()
        .get("worker_processes")
        .and_then(|value| value.index())
        .unwrap();
    let (file, line) = config.load_output().location(handle).unwrap();
    assert_eq!(file, fixtures_path("full"));
    assert_eq!(line, 2);
}

#[test]
fn test_broken_fixture_keeps_good_files() {
    let prefix = TempDir::new().unwrap();
    let config = parse_fixture("broken", prefix.path());
    let output = config.load_output();
    let dir = fixtures_path("broken").parent().unwrap().to_path_buf();

    assert_eq!(output.files.len(), 4);
    assert!(!output.files[&dir.join("good.conf")].broken);
    assert!(output.files[&dir.join("bad.conf")].broken);
    assert!(output.files[&dir.join("missing.conf")].broken);
    assert_eq!(output.files[&dir.join("missing.conf")].meta.signature(), "0_0_0000");

    let errors = config.parser_errors();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|message| {
        message == &format!("failed to parse {} due to UnclosedBlock", dir.join("bad.conf").display())
    }));
    assert!(errors.iter().any(|message| {
        message.starts_with(&format!("failed to read {} due to:", dir.join("missing.conf").display()))
    }));

    assert_eq!(
        config.summary().stub_status_urls,
        vec!["127.0.0.1:8081/status"]
    );
}

#[test]
fn test_unreadable_include_records_one_error() {
    let temp = TempDir::new().unwrap();
    let root = write(
        temp.path(),
        "nginx.conf",
        "http {\n    include gone.conf;\n    server {\n        listen 8080;\n        location /nginx_status { stub_status; }\n    }\n}\n",
    );

    let mut config = NginxConfig::new(&root, temp.path());
    config.full_parse();

    assert_eq!(config.parser_errors().len(), 1);
    assert_eq!(
        config.summary().stub_status_urls,
        vec!["127.0.0.1:8080/nginx_status"]
    );
}

#[test]
fn test_latin1_comment_keeps_the_file() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("nginx.conf");
    fs::write(
        &root,
        b"# Konfiguration f\xfcr den Server\nhttp { access_log /var/log/a.log; server { listen 80; location /status { stub_status; } } }\n",
    )
    .unwrap();

    let mut config = NginxConfig::new(&root, temp.path());
    config.full_parse();

    assert!(config.parser_errors().is_empty());
    assert!(!config.load_output().files[&root].broken);
    assert_eq!(config.summary().stub_status_urls, vec!["127.0.0.1:80/status"]);
    assert_eq!(config.summary().access_logs["/var/log/a.log"], None);
    assert_eq!(config.collect_structure(false).unwrap().files.len(), 1);
}

#[test]
fn test_commented_include_is_not_followed() {
    let temp = TempDir::new().unwrap();
    let root = write(
        temp.path(),
        "nginx.conf",
        "http {\n    # include extra.conf;\n    server { listen 80; }\n}\n",
    );
    write(temp.path(), "extra.conf", "access_log /var/log/extra.log;\n");

    let mut config = NginxConfig::new(&root, temp.path());
    config.full_parse();

    assert_eq!(config.load_output().files.len(), 1);
    assert!(config.summary().access_logs.is_empty());
}

#[test]
fn test_default_logs_and_exclusion() {
    let temp = TempDir::new().unwrap();
    let prefix = temp.path().join("prefix");
    write(&prefix, "logs/access.log", "");
    write(&prefix, "logs/error.log", "");

    let config = parse_fixture("full", &prefix);
    let summary = config.summary();
    let access_log = prefix.join("logs/access.log").display().to_string();
    let error_log = prefix.join("logs/error.log").display().to_string();
    assert_eq!(summary.access_logs[&access_log], None);
    // already declared at warn in the configuration
    assert_eq!(summary.error_logs[&error_log], ErrorLogLevel::Warn);

    let rules = vec![
        "ssl_access*".to_string(),
        format!("{}/", prefix.join("logs").display()),
    ];
    let mut config = NginxConfig::new(fixtures_path("full"), &prefix).with_exclude_rules(rules.as_slice());
    config.full_parse();
    let summary = config.summary();
    assert_eq!(
        summary.access_logs.keys().collect::<Vec<_>>(),
        vec!["/var/log/nginx/access.log"]
    );
    assert!(summary.error_logs.is_empty());
}

#[test]
fn test_checksum_tracks_changes() {
    let temp = TempDir::new().unwrap();
    let root = write(
        temp.path(),
        "nginx.conf",
        "http {\n    include site.conf;\n}\n",
    );
    let site = write(
        temp.path(),
        "site.conf",
        "server {\n    listen 443 ssl;\n    ssl_certificate site.crt;\n}\n",
    );
    let cert = write(temp.path(), "site.crt", "CERT-A\n");

    let mut config = NginxConfig::new(&root, temp.path());
    config.full_parse();
    let first = config.checksum();
    assert_eq!(first.len(), 64);

    config.full_parse();
    assert_eq!(config.checksum(), first);

    let file = fs::File::options().write(true).open(&site).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(3600))
        .unwrap();
    drop(file);
    config.full_parse();
    let after_touch = config.checksum();
    assert_ne!(after_touch, first);

    fs::write(&cert, "CERT-B\n").unwrap();
    config.full_parse();
    let after_cert = config.checksum();
    assert_ne!(after_cert, after_touch);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&site, fs::Permissions::from_mode(0o600)).unwrap();
        config.full_parse();
        assert_ne!(config.checksum(), after_cert);
    }
}

#[test]
fn test_structure_matches_full_parse() {
    let prefix = TempDir::new().unwrap();
    let config = parse_fixture("full", prefix.path());
    let dir = fixtures_path("full").parent().unwrap().to_path_buf();

    let structure = config.collect_structure(true).unwrap();
    for path in config.load_output().files.keys() {
        assert!(structure.files.contains_key(path), "{}", path.display());
    }
    assert!(structure.files.contains_key(&dir.join("certs/example.crt")));

    let structure = config.collect_structure(false).unwrap();
    assert!(!structure.files.contains_key(&dir.join("certs/example.crt")));
}

#[test]
fn test_access_log_with_configured_format() {
    let prefix = TempDir::new().unwrap();
    let config = parse_fixture("full", prefix.path());
    let format = config
        .summary()
        .access_log_format("/var/log/nginx/access.log")
        .unwrap();

    let mut compiler = LogFormatCompiler::new();
    let parser = AccessLineParser::new(compiler.compile(format).unwrap());
    let parsed = parser.parse(
        "10.0.0.9 - - [02/Mar/2016:13:49:01 +0000] \"GET /api/users HTTP/1.1\" 200 612 \"-\" \"curl/7.47.0\" 0.005 0.004",
    );

    assert!(parsed.is_match());
    assert!(!parsed.malformed);
    assert_eq!(parsed.get("status").and_then(FieldValue::as_str), Some("200"));
    assert_eq!(parsed.get("body_bytes_sent"), Some(&FieldValue::Int(612)));
    assert_eq!(
        parsed.get("request_method").and_then(FieldValue::as_str),
        Some("GET")
    );
    assert_eq!(
        parsed.get("request_time"),
        Some(&FieldValue::FloatList(vec![0.005]))
    );
    assert_eq!(
        parsed.get("upstream_response_time"),
        Some(&FieldValue::FloatList(vec![0.004]))
    );

    // unknown logs fall back to combined
    let combined = config
        .summary()
        .access_log_format("/var/log/nginx/ssl_access.log")
        .unwrap();
    assert_eq!(compiler.compile(combined).unwrap().raw(), nginx_agent::COMBINED_FORMAT);
    assert_eq!(compiler.len(), 2);
}

#[test]
fn test_error_log_classification() {
    let classifier = ErrorLineClassifier::new(ErrorLogLevel::Warn).unwrap();
    let line = "2016/03/02 13:49:01 [warn] 1234#0: *5 an upstream response is buffered to a \
                temporary file /var/cache/nginx/proxy_temp/1/00/0000000001 while reading upstream";
    assert_eq!(
        classifier.classify(line),
        Some(UPSTREAM_RESPONSE_BUFFERED)
    );
    assert_eq!(classifier.classify("worker process 1234 exited"), None);
}
