//! Helper operation tests over a full session.

mod common;

use common::{Reply, ScriptedConnector};
use ssh_session::{CommandRunner, RunOptions, Session, SessionError, SessionHelpers};

fn open(connector: &ScriptedConnector) -> Session {
    let mut session = Session::builder("web01", "deploy")
        .connector(connector.clone())
        .build()
        .unwrap();
    session.open().unwrap();
    session
}

#[test]
fn test_env_trims_trailing_crlf() {
    let connector = ScriptedConnector::new().reply("echo $HOME", Reply::ok("/root\r\n"));
    let mut session = open(&connector);

    assert_eq!(session.env("HOME").unwrap(), "/root");
}

#[test]
fn test_capture_records_history() {
    let connector = ScriptedConnector::new().reply("whoami", Reply::ok("deploy\n"));
    let mut session = open(&connector);

    assert_eq!(session.capture("whoami").unwrap(), "deploy");
    assert_eq!(session.history().len(), 1);
}

#[test]
fn test_read_file() {
    let connector = ScriptedConnector::new()
        .reply("cat /etc/hostname", Reply::ok("web01\n"))
        .reply("cat /etc/shadow", Reply::exit("Permission denied\n", "1"));
    let mut session = open(&connector);

    assert_eq!(session.read_file("/etc/hostname").unwrap(), "web01\n");
    assert_eq!(session.read_file("/etc/shadow").unwrap(), "");
}

#[test]
fn test_filesystem_checks() {
    let connector = ScriptedConnector::new()
        .reply("test -d /srv", Reply::ok(""))
        .reply("test -f /srv", Reply::exit("", "1"))
        .reply("test -h /srv/current", Reply::ok(""));
    let mut session = open(&connector);

    assert!(session.directory_exists("/srv").unwrap());
    assert!(!session.file_exists("/srv").unwrap());
    assert!(session.symlink_exists("/srv/current").unwrap());
}

#[test]
fn test_kill_process() {
    let connector = ScriptedConnector::new()
        .reply("kill -15 4242", Reply::ok(""))
        .reply("ps -p 4242", Reply::exit("", "1"));
    let mut session = open(&connector);

    assert!(session.kill_process(4242, 15).unwrap());
    assert_eq!(connector.submitted(), vec!["kill -15 4242", "ps -p 4242"]);
}

#[test]
fn test_users_and_groups() {
    let connector = ScriptedConnector::new()
        .reply("id deploy", Reply::ok("uid=1000(deploy)\n"))
        .reply("id -g deploy", Reply::ok("1000\n"));
    let mut session = open(&connector);

    assert!(session.has_user("deploy").unwrap());
    assert!(session.has_group("deploy").unwrap());
    assert!(!session.has_user("nobody-here").unwrap());
}

#[test]
fn test_export_and_chdir() {
    let connector = ScriptedConnector::new()
        .reply("export RAILS_ENV=production", Reply::ok(""))
        .reply("export PORT=8080", Reply::ok(""))
        .reply("cd /srv/app", Reply::ok(""))
        .reply("pwd", Reply::ok("/srv/app\n"));
    let mut session = open(&connector);

    assert!(session
        .export_all([("RAILS_ENV", "production"), ("PORT", "8080")])
        .unwrap());
    assert!(session.chdir("/srv/app").unwrap());
    assert_eq!(session.pwd().unwrap(), "/srv/app");
}

#[test]
fn test_last_exit_code() {
    let connector = ScriptedConnector::new().reply("echo $?", Reply::ok("3\r\n"));
    let mut session = open(&connector);

    assert_eq!(session.last_exit_code().unwrap(), 3);
}

#[test]
fn test_last_exit_code_unparseable() {
    let connector = ScriptedConnector::new().reply("echo $?", Reply::ok("\n"));
    let mut session = open(&connector);

    assert!(matches!(session.last_exit_code(), Err(SessionError::Parse(_))));
}

#[test]
fn test_sudo_respects_options() {
    let connector = ScriptedConnector::new().reply("sudo systemctl restart app", Reply::ok(""));
    let mut session = open(&connector);

    let result = session
        .sudo("systemctl restart app", RunOptions::new().history(false))
        .unwrap();
    assert!(result.success());
    assert!(session.history().is_empty());
}

#[test]
fn test_helpers_need_open_session() {
    let mut session = Session::builder("web01", "deploy")
        .connector(ScriptedConnector::new())
        .build()
        .unwrap();

    assert!(matches!(
        session.file_exists("/etc/passwd"),
        Err(SessionError::NotConnected)
    ));
}

#[test]
fn test_session_as_command_runner() {
    let connector = ScriptedConnector::new().reply("uptime", Reply::ok("up 3 days\n"));
    let mut session = open(&connector);

    let runner: &mut dyn CommandRunner = &mut session;
    let result = runner.run_command("uptime", RunOptions::default()).unwrap();
    assert_eq!(result.output_trimmed(), "up 3 days");
}
