use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Context;
use buildnum_ledger::{BuildNumber, LedgerConfig};
use buildnum_repo::{
    Author, CommitOptions, GitRepository, GraphRepository, RepoError, Repository,
    RepositoryConfig, SyncOutcome,
};
use colored::Colorize;

use crate::cli::*;

const DEFAULT_USER: &str = "build number";
const DEFAULT_EMAIL: &str = "not set";

type Ledger = BuildNumber<Box<dyn Repository>>;

/// Where command output goes and where prompts read from.
pub struct Console<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
    pub input: &'a mut dyn BufRead,
}

pub fn run_command(cli: Cli, console: &mut Console<'_>) -> anyhow::Result<()> {
    let repo_path = cli.repo.as_path();
    match cli.command {
        Command::Init(args) => cmd_init(args, repo_path, console),
        Command::Commit(args) => cmd_commit(args, &GraphRepository::open(repo_path)?, console),
        Command::Get(args) => {
            let (ledger, config) = open_ledger(repo_path)?;
            let author = resolve_author(&config, args.author);
            let entry = ledger.get(&args.namespace, &author, args.create)?;
            writeln!(console.out, "{}", entry.number)?;
            Ok(())
        }
        Command::Set(args) => {
            let (ledger, config) = open_ledger(repo_path)?;
            let author = resolve_author(&config, args.author);
            let entry = ledger.set(&args.namespace, &author, args.number)?;
            writeln!(console.out, "{}", entry.number)?;
            Ok(())
        }
        Command::Inc(args) => cmd_inc(args, repo_path, console),
        Command::Hash(args) => {
            let (ledger, _) = open_ledger(repo_path)?;
            let entry = ledger.hash(&args.namespace, args.number)?;
            writeln!(console.out, "{}", entry.hash)?;
            Ok(())
        }
        Command::Push(args) => {
            let (ledger, _) = open_ledger(repo_path)?;
            report_sync(&ledger.push(&args.remote)?, console)
        }
        Command::Fetch(args) => {
            let (ledger, _) = open_ledger(repo_path)?;
            report_sync(&ledger.fetch(&args.remote)?, console)
        }
        Command::Namespace(args) => cmd_namespace(args, &open_ledger(repo_path)?.0, console),
        Command::Remote(args) => cmd_remote(args, repo_path, console),
        Command::Version => {
            writeln!(console.out, "build-number {}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
    }
}

/// The `.buildnum` repository enclosing `path` if there is one, otherwise
/// the enclosing git repository. Git repositories carry no `config.toml`.
fn open_repository(path: &Path) -> anyhow::Result<(Box<dyn Repository>, RepositoryConfig)> {
    match GraphRepository::open(path) {
        Ok(repo) => {
            let config = repo.config()?;
            Ok((Box::new(repo), config))
        }
        Err(RepoError::NotARepository { .. }) => {
            let repo = GitRepository::open(path)?;
            Ok((Box::new(repo), RepositoryConfig::default()))
        }
        Err(e) => Err(e.into()),
    }
}

fn open_ledger(path: &Path) -> anyhow::Result<(Ledger, RepositoryConfig)> {
    let (repo, config) = open_repository(path)?;
    let ledger_config = LedgerConfig::from_section(config.ledger.as_ref());
    Ok((BuildNumber::with_config(repo, ledger_config), config))
}

/// Flags first, then `[user]` from the repository config, then defaults.
fn resolve_author(config: &RepositoryConfig, args: AuthorArgs) -> Author {
    let user = config.user.clone().unwrap_or_default();
    let name = args
        .user
        .or(user.name)
        .unwrap_or_else(|| DEFAULT_USER.to_string());
    let email = args
        .email
        .or(user.email)
        .unwrap_or_else(|| DEFAULT_EMAIL.to_string());
    Author::new(name, email)
}

fn cmd_init(args: InitArgs, repo_path: &Path, console: &mut Console<'_>) -> anyhow::Result<()> {
    let path = args.path.as_deref().unwrap_or(repo_path);
    let repo = if args.bare {
        GraphRepository::init_bare(path)?
    } else {
        GraphRepository::init(path)?
    };
    let mode = if args.bare { "bare " } else { "" };
    let dir = repo.dir().unwrap_or(path);
    writeln!(
        console.out,
        "{} Initialized empty {}buildnum repository in {}",
        "✓".green().bold(),
        mode,
        dir.display().to_string().bold()
    )?;
    Ok(())
}

fn cmd_commit(args: CommitArgs, repo: &GraphRepository, console: &mut Console<'_>) -> anyhow::Result<()> {
    let author = resolve_author(&repo.config()?, args.author);
    let (file, content) = match &args.file {
        Some(path) => {
            let name = path
                .file_name()
                .with_context(|| format!("not a file: {}", path.display()))?
                .to_string_lossy()
                .into_owned();
            let content =
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            (name, content)
        }
        None => ("message".to_string(), args.message.clone().into_bytes()),
    };

    let reference = repo.head_target()?;
    let options = CommitOptions::new().with_author(author).with_head();
    let tip = repo.commit(&reference, &file, &content, &args.message, &options)?;
    writeln!(console.out, "{}", tip.hash)?;
    Ok(())
}

fn cmd_inc(args: IncArgs, repo_path: &Path, console: &mut Console<'_>) -> anyhow::Result<()> {
    let (ledger, config) = open_ledger(repo_path)?;
    let author = resolve_author(&config, args.author);
    let (entry, updated) = ledger.inc(&args.namespace, &author, args.force)?;
    if !updated {
        writeln!(console.err, "build number already set")?;
        writeln!(console.err, "use --force to override")?;
    }
    writeln!(console.out, "{}", entry.number)?;
    Ok(())
}

fn cmd_namespace(args: NamespaceArgs, ledger: &Ledger, console: &mut Console<'_>) -> anyhow::Result<()> {
    match args.action {
        NamespaceAction::List => {
            let namespaces = ledger.namespaces()?;
            let width = namespaces.iter().map(|ns| ns.name.len()).max().unwrap_or(0);
            for ns in &namespaces {
                writeln!(console.out, "{:<width$}  {}", ns.name, ns.entry.number)?;
            }
        }
        NamespaceAction::Delete { namespaces } => ledger.delete(&namespaces)?,
        NamespaceAction::Mirror { remote, yes } => {
            let warning = "All remote namespaces that are not present locally will be deleted!";
            if yes || confirm(console, warning)? {
                let outcome = ledger.mirror(&remote.remote)?;
                report_sync(&outcome, console)?;
            }
        }
        NamespaceAction::Clear { yes } => {
            if yes || confirm(console, "All local namespaces will be deleted!")? {
                ledger.clear()?;
            }
        }
    }
    Ok(())
}

fn cmd_remote(args: RemoteArgs, repo_path: &Path, console: &mut Console<'_>) -> anyhow::Result<()> {
    let (repo, _) = open_repository(repo_path)?;
    match args.action {
        RemoteAction::Add { name, urls } => {
            repo.add_remote(&name, &urls)?;
            writeln!(console.out, "Added remote {} → {}", name.bold(), urls[0].blue())?;
        }
    }
    Ok(())
}

/// Ask before a destructive namespace operation. Empty input or EOF is no.
fn confirm(console: &mut Console<'_>, warning: &str) -> anyhow::Result<bool> {
    writeln!(console.out, "{}", warning.red().bold())?;
    writeln!(console.out, "Use --yes to skip the confirmation prompt.")?;
    loop {
        write!(console.out, "Continue? (y/N) ")?;
        console.out.flush()?;
        let mut answer = String::new();
        if console.input.read_line(&mut answer)? == 0 {
            return Ok(false);
        }
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "" | "n" | "no" => return Ok(false),
            _ => {}
        }
    }
}

fn report_sync(outcome: &SyncOutcome, console: &mut Console<'_>) -> anyhow::Result<()> {
    if outcome.is_up_to_date() {
        writeln!(console.err, "{}", "Everything up-to-date".dimmed())?;
    }
    for update in outcome.updates() {
        writeln!(console.err, " {update}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    struct Run {
        result: anyhow::Result<()>,
        out: String,
        err: String,
    }

    fn run_with_input(repo: &Path, args: &[&str], input: &str) -> Run {
        let repo = repo.display().to_string();
        let argv = ["build-number", "--repo", repo.as_str()]
            .into_iter()
            .chain(args.iter().copied());
        let cli = Cli::try_parse_from(argv).unwrap();
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let mut input = input.as_bytes();
        let result = run_command(
            cli,
            &mut Console {
                out: &mut out,
                err: &mut err,
                input: &mut input,
            },
        );
        Run {
            result,
            out: String::from_utf8(out).unwrap(),
            err: String::from_utf8(err).unwrap(),
        }
    }

    fn run(repo: &Path, args: &[&str]) -> Run {
        run_with_input(repo, args, "")
    }

    fn ok(repo: &Path, args: &[&str]) -> String {
        let run = run(repo, args);
        if let Err(e) = run.result {
            panic!("{args:?} failed: {e:#}");
        }
        run.out
    }

    /// A work repository with one commit on HEAD.
    fn repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        ok(dir.path(), &["init"]);
        ok(dir.path(), &["commit", "-m", "initial"]);
        dir
    }

    #[test]
    fn init_then_get_without_head() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ok(dir.path(), &["init"]).contains("Initialized empty"));
        assert!(dir.path().join(".buildnum/HEAD").is_file());

        let run = run(dir.path(), &["get", "--create"]);
        let err = run.result.unwrap_err();
        assert!(format!("{err:#}").contains("could not find head"));
    }

    #[test]
    fn outside_a_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(dir.path(), &["get"]).result.unwrap_err();
        assert!(err.to_string().contains("not a git or buildnum repository"));
    }

    #[test]
    fn inc_prints_number_and_hint() {
        let dir = repo();
        let first = run(dir.path(), &["inc"]);
        assert_eq!(first.out, "1\n");
        assert_eq!(first.err, "build number already set\nuse --force to override\n");

        let forced = run(dir.path(), &["inc", "--force"]);
        assert_eq!(forced.out, "2\n");
        assert!(forced.err.is_empty());

        ok(dir.path(), &["commit", "-m", "next"]);
        assert_eq!(ok(dir.path(), &["inc"]), "3\n");
        assert_eq!(ok(dir.path(), &["get"]), "3\n");
    }

    #[test]
    fn get_missing_namespace_fails() {
        let dir = repo();
        let err = run(dir.path(), &["get", "-n", "android"]).result.unwrap_err();
        assert!(err.to_string().contains("could not find build number"));
        assert_eq!(ok(dir.path(), &["get", "-n", "android", "-c"]), "1\n");
    }

    #[test]
    fn set_then_hash() {
        let dir = repo();
        let tip = ok(dir.path(), &["commit", "-m", "release"]);
        assert_eq!(ok(dir.path(), &["set", "123"]), "123\n");
        assert_eq!(ok(dir.path(), &["hash", "123"]), tip);
        assert!(run(dir.path(), &["hash", "999"]).result.is_err());
    }

    #[test]
    fn commit_records_file_contents() {
        let dir = repo();
        let file = dir.path().join("VERSION");
        fs::write(&file, "1.2.3\n").unwrap();
        ok(dir.path(), &["commit", "-m", "bump", file.to_str().unwrap()]);

        let repo = GraphRepository::open(dir.path()).unwrap();
        let head = repo.head().unwrap();
        assert_eq!(repo.content(&head.path, "VERSION").unwrap(), b"1.2.3\n");
    }

    #[test]
    fn author_falls_back_to_config_user() {
        let dir = repo();
        let config_path = dir.path().join(".buildnum/config.toml");
        fs::write(&config_path, "[user]\nname = \"ci\"\n").unwrap();
        ok(dir.path(), &["set", "5"]);

        let repo = GraphRepository::open(dir.path()).unwrap();
        let history = repo
            .commits("refs/build-number/default", &Default::default())
            .unwrap();
        assert_eq!(history[0].author, Author::new("ci", DEFAULT_EMAIL));

        ok(dir.path(), &["set", "6", "-u", "release-bot"]);
        let history = repo
            .commits("refs/build-number/default", &Default::default())
            .unwrap();
        assert_eq!(history[0].author.name, "release-bot");
    }

    #[test]
    fn namespace_list_is_aligned() {
        let dir = repo();
        ok(dir.path(), &["set", "7", "-n", "a"]);
        ok(dir.path(), &["set", "12", "-n", "android"]);
        assert_eq!(ok(dir.path(), &["namespace", "list"]), "a        7\nandroid  12\n");
    }

    #[test]
    fn namespace_delete_and_clear() {
        let dir = repo();
        for ns in ["a", "b", "c"] {
            ok(dir.path(), &["set", "1", "-n", ns]);
        }
        ok(dir.path(), &["namespace", "delete", "a"]);
        assert_eq!(ok(dir.path(), &["namespace", "list"]), "b  1\nc  1\n");

        let declined = run_with_input(dir.path(), &["namespace", "clear"], "n\n");
        assert!(declined.result.is_ok());
        assert!(declined.out.contains("Continue? (y/N)"));
        assert_eq!(ok(dir.path(), &["namespace", "list"]), "b  1\nc  1\n");

        let accepted = run_with_input(dir.path(), &["namespace", "clear"], "maybe\ny\n");
        assert!(accepted.result.is_ok());
        assert_eq!(accepted.out.matches("Continue?").count(), 2);
        assert_eq!(ok(dir.path(), &["namespace", "list"]), "");
    }

    #[test]
    fn push_fetch_and_mirror_through_remote() {
        let dir = repo();
        let remote = tempfile::tempdir().unwrap();
        ok(remote.path(), &["init", "--bare"]);
        let remote_url = format!("file://{}", remote.path().display());
        ok(dir.path(), &["remote", "add", "origin", remote_url.as_str()]);

        ok(dir.path(), &["set", "4", "-n", "x"]);
        ok(dir.path(), &["set", "9", "-n", "y"]);
        let pushed = run(dir.path(), &["push"]);
        assert!(pushed.result.is_ok());
        assert!(pushed.err.contains("refs/build-number/x"));
        assert!(run(dir.path(), &["push"]).err.contains("Everything up-to-date"));

        let other = repo();
        ok(other.path(), &["remote", "add", "origin", remote_url.as_str()]);
        ok(other.path(), &["fetch"]);
        assert_eq!(ok(other.path(), &["namespace", "list"]), "x  4\ny  9\n");

        ok(dir.path(), &["namespace", "delete", "x"]);
        ok(dir.path(), &["namespace", "mirror", "--yes"]);
        let remote_repo = GraphRepository::open(remote.path()).unwrap();
        let remaining: Vec<String> = remote_repo
            .refs(&Default::default())
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(remaining, ["refs/build-number/y"]);
    }

    #[test]
    fn push_without_remote_fails() {
        let dir = repo();
        let err = run(dir.path(), &["push", "-r", "nowhere"]).result.unwrap_err();
        assert!(err.to_string().contains("remote not found: nowhere"));
    }

    #[test]
    fn version_prints_package_version() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            ok(dir.path(), &["version"]),
            format!("build-number {}\n", env!("CARGO_PKG_VERSION"))
        );
    }

    // ---- git repositories ----

    /// A git work tree with one commit on `main`.
    fn git_repo() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let repo = GitRepository::init(dir.path()).unwrap();
        let tip = repo
            .commit(
                "refs/heads/main",
                "README",
                b"hello",
                "initial",
                &CommitOptions::new().with_head(),
            )
            .unwrap();
        (dir, tip.hash)
    }

    #[test]
    fn ledger_runs_inside_git_repository() {
        let (dir, head) = git_repo();
        let nested = dir.path().join("src");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(ok(&nested, &["inc"]), "1\n");
        assert_eq!(ok(&nested, &["set", "41", "-n", "ios"]), "41\n");
        assert_eq!(ok(&nested, &["hash", "41", "-n", "ios"]), format!("{head}\n"));
        assert_eq!(ok(dir.path(), &["namespace", "list"]), "default  1\nios      41\n");

        let repo = GitRepository::open(dir.path()).unwrap();
        let counter = repo
            .git()
            .find_reference("refs/build-number/ios")
            .unwrap()
            .peel_to_commit()
            .unwrap();
        assert_eq!(counter.author().name(), Some(DEFAULT_USER));
    }

    #[test]
    fn git_push_and_mirror() {
        let (dir, _) = git_repo();
        let remote = tempfile::tempdir().unwrap();
        let remote_repo = GitRepository::init_bare(remote.path()).unwrap();
        let url = remote.path().display().to_string();
        ok(dir.path(), &["remote", "add", "origin", url.as_str()]);

        ok(dir.path(), &["set", "3", "-n", "x"]);
        ok(dir.path(), &["set", "4", "-n", "y"]);
        assert!(run(dir.path(), &["push"]).err.contains("refs/build-number/y"));

        ok(dir.path(), &["namespace", "delete", "y"]);
        ok(dir.path(), &["namespace", "mirror", "-y"]);
        let left: Vec<String> = remote_repo
            .refs(&Default::default())
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(left, ["refs/build-number/x"]);
    }
}
