use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn audoc() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("audoc"));
    // Pin the zone so rendered timestamps are reproducible.
    cmd.env("TZ", "UTC");
    cmd
}

#[test]
fn test_single_syscall_event_json() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = audoc();
    cmd.write_stdin("type=SYSCALL msg=audit(1.000:7): a0=1\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"serial\":7"))
        .stdout(predicate::str::contains(
            "\"time\":\"1970-01-01T00:00:01.000+00:00\"",
        ))
        .stdout(predicate::str::contains("\"syscall\":{"))
        .stdout(predicate::str::contains("\"a0\":[\"1\"]"))
        .stdout(predicate::str::contains("\"text\"").not());

    Ok(())
}

#[test]
fn test_stream_wraps_into_one_document() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = audoc();
    cmd.write_stdin(
        "type=SYSCALL msg=audit(1.000:1): a0=1\n\
         type=SYSCALL msg=audit(2.000:2): a0=2\n",
    );

    cmd.assert().success().stdout(predicate::function(|out: &str| {
        serde_json::from_str::<serde_json::Value>(out)
            .ok()
            .and_then(|v| v.as_array().map(|a| a.len() == 2))
            .unwrap_or(false)
    }));

    Ok(())
}

#[test]
fn test_execve_slices_aggregate() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = audoc();
    cmd.write_stdin("type=EXECVE msg=audit(1.000:1): argc=1 a0_len=8 a0[0]=666F a0[1]=6F00\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"execve\":{"))
        .stdout(predicate::str::contains("\"args\":[\"foo\\u0000\"]"));

    Ok(())
}

#[test]
fn test_invalid_execve_keeps_event_with_error() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = audoc();
    cmd.write_stdin(
        "type=EXECVE msg=audit(1.000:5): argc=1 a0=\"x\"\n\
         type=EXECVE msg=audit(1.000:5): argc=1 a0=\"y\"\n",
    );

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "\"error\":\"Invalid execve record sequence encountered\"",
        ))
        .stdout(predicate::str::contains("\"execve\":").not())
        .stdout(predicate::str::contains("\"data\"").not())
        // The raw lines stay around for diagnosis.
        .stdout(predicate::str::contains("\"text\":["));

    Ok(())
}

#[test]
fn test_path_items_reordered_by_index() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = audoc();
    cmd.write_stdin(
        "type=PATH msg=audit(1.000:9): item=1 name=\"/etc\"\n\
         type=PATH msg=audit(1.000:9): item=0 name=\"/usr\"\n",
    );

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"path\":["))
        .stdout(predicate::function(|out: &str| {
            match (out.find("/usr"), out.find("/etc")) {
                (Some(first), Some(second)) => first < second,
                _ => false,
            }
        }));

    Ok(())
}

#[test]
fn test_repeated_avc_records_aggregate() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = audoc();
    cmd.write_stdin(
        "type=AVC msg=audit(1.000:3): pid=1\n\
         type=AVC msg=audit(1.000:3): pid=2\n\
         type=AVC msg=audit(1.000:3): pid=3\n",
    );

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"avc\":{"))
        .stdout(predicate::str::contains("\"items\":["))
        .stdout(predicate::str::contains("\"pid\":[\"1\"]"))
        .stdout(predicate::str::contains("\"pid\":[\"2\"]"))
        .stdout(predicate::str::contains("\"pid\":[\"3\"]"))
        // The three raw lines are newline-joined in the container raw.
        .stdout(predicate::str::contains("pid=1\\ntype=AVC"));

    Ok(())
}

#[test]
fn test_trimming_respects_event_budget() -> Result<(), Box<dyn std::error::Error>> {
    let mut input = String::from("type=SYSCALL msg=audit(1.000:11): a0=1\n");
    for i in 0..100 {
        input.push_str(&format!(
            "type=TYPE{i:03} msg=audit(1.000:11): name{i:03}={:x<64}\n",
            "a"
        ));
    }

    let mut cmd = audoc();
    cmd.arg("--events-per-doc")
        .arg("none")
        .arg("--max-event-size")
        .arg("2048")
        .write_stdin(input);

    cmd.assert()
        .success()
        .stdout(predicate::function(|out: &str| out.len() <= 2048))
        .stdout(predicate::str::contains("\"trimmed\":[]"))
        .stdout(predicate::str::contains("\"syscall\":{"));

    Ok(())
}

#[test]
fn test_bare_mode_emits_unwrapped_events() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = audoc();
    cmd.arg("--events-per-doc").arg("none").write_stdin(
        "type=SYSCALL msg=audit(1.000:1): a0=1\n\
         type=SYSCALL msg=audit(2.000:2): a0=2\n",
    );

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("{"))
        .stdout(predicate::function(|out: &str| {
            out.matches("\"serial\":").count() == 2
        }));

    Ok(())
}

#[test]
fn test_fold_all_renders_single_line() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = audoc();
    cmd.arg("--fold")
        .arg("all")
        .write_stdin("type=SYSCALL msg=audit(1.000:7): a0=1\n");

    cmd.assert()
        .success()
        .stdout(predicate::function(|out: &str| !out.contains('\n')));

    Ok(())
}

#[test]
fn test_xml_document_well_formed() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = audoc();
    cmd.arg("-l").arg("xml").arg("--with-raw").write_stdin(
        "type=SYSCALL msg=audit(1.000:7): a0=1 comm=\"a<b>&c\"\n\
         type=PATH msg=audit(1.000:7): item=0 name=\"/etc\"\n",
    );

    let output = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output)?;
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(text.contains("<event serial=\"7\""));
    assert!(text.contains("<text>"));
    assert!(text.ends_with("</log>"));

    let mut reader = quick_xml::Reader::from_str(&text);
    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("output is not well-formed XML: {e}"),
        }
    }

    Ok(())
}

#[test]
fn test_output_to_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("audit.json");

    let mut cmd = audoc();
    cmd.arg("-f")
        .arg(&path)
        .write_stdin("type=SYSCALL msg=audit(1.000:7): a0=1\n");
    cmd.assert().success().stdout(predicate::str::is_empty());

    let written = fs::read_to_string(&path)?;
    assert!(written.contains("\"serial\":7"));

    Ok(())
}

#[test]
fn test_input_file_argument() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("audit.log");
    fs::write(&path, "type=SYSCALL msg=audit(1.000:7): a0=1\n")?;

    let mut cmd = audoc();
    cmd.arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"serial\":7"));

    Ok(())
}

#[test]
fn test_one_event_per_document() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = audoc();
    cmd.arg("--events-per-doc").arg("1").write_stdin(
        "type=SYSCALL msg=audit(1.000:1): a0=1\n\
         type=SYSCALL msg=audit(2.000:2): a0=2\n",
    );

    // Two documents: each opens with its own prologue and closes with an
    // epilogue on its own line.
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("["))
        .stdout(predicate::function(|out: &str| {
            out.matches("\n]").count() == 2
        }));

    Ok(())
}

#[test]
fn test_undersized_event_budget_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = audoc();
    cmd.arg("--max-event-size").arg("64").write_stdin("");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("event size budget"));

    Ok(())
}

#[test]
fn test_malformed_input_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = audoc();
    cmd.write_stdin("this is not an audit record\n");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed parsing the audit log"));

    Ok(())
}

#[test]
fn test_empty_input_yields_empty_document() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = audoc();
    cmd.write_stdin("");

    // The epilogue closes on its own line at the default fold level.
    cmd.assert().success().stdout("[\n]");

    Ok(())
}
