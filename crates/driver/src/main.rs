use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;

use backend::{encode, verify::verify_ir, Encoded};
use syntax::{Syntax, Workspace};

#[derive(Parser, Debug)]
#[command(
    name = "emberc",
    about = "Ember compiler back end — LLVM IR emission from checked module snapshots",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode a module snapshot (JSON) and print LLVM IR text
    EmitLlvm(EmitArgs),
    /// Encode, then assemble with llc (and link with clang unless -S/-c)
    Build(BuildArgs),
    /// Check the structural invariants of an .ll file
    Verify {
        /// IR file to check
        input: PathBuf,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Emit for the mipsel data layout and triple
    #[arg(long = "mipsel")]
    mipsel: bool,
    /// Emit for the x86_64 data layout and triple (default)
    #[arg(long = "x86_64")]
    x86_64: bool,
}

impl TargetArgs {
    fn workspace(&self) -> Workspace {
        let mut flags = Vec::new();
        if self.mipsel {
            flags.push("--mipsel".to_string());
        }
        if self.x86_64 {
            flags.push("--x86_64".to_string());
        }
        Workspace::new(flags)
    }
}

#[derive(Args, Debug)]
struct EmitArgs {
    /// Module snapshot produced by the front end
    input: PathBuf,
    /// Output path (defaults to stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
    /// Run the structural verifier over the emitted text
    #[arg(long = "verify")]
    verify: bool,
    #[command(flatten)]
    target: TargetArgs,
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Module snapshot produced by the front end
    input: PathBuf,
    /// Output path (default: a.out, or stem.s/.o for -S/-c)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
    /// Stop after llc and keep the assembly (.s)
    #[arg(short = 'S', long = "emit-asm")]
    emit_asm: bool,
    /// Stop after llc and keep the object (.o)
    #[arg(short = 'c', long = "compile-only")]
    compile_only: bool,
    /// Optimization level passed to llc/clang
    #[arg(short = 'O', value_name = "LEVEL")]
    opt: Option<String>,
    #[command(flatten)]
    target: TargetArgs,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::EmitLlvm(args) => {
            let code = cmd_emit_llvm(&args)?;
            std::process::exit(code);
        }
        Commands::Build(args) => {
            let code = cmd_build(&args)?;
            std::process::exit(code);
        }
        Commands::Verify { input } => {
            let ir = fs::read_to_string(&input)
                .with_context(|| format!("cannot read {}", input.display()))?;
            verify_ir(&ir)?;
            Ok(())
        }
    }
}

fn load_syntax(path: &Path) -> Result<Syntax> {
    let text =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid module snapshot", path.display()))
}

/// Run the generator and report its diagnostics; the accumulated error
/// count becomes the process exit code. Partial output is still written.
fn encode_snapshot(args_input: &Path, ws: &Workspace) -> Result<Encoded> {
    let sx = load_syntax(args_input)?;
    let encoded = encode(ws, &sx)?;
    for diag in &encoded.diagnostics {
        eprintln!("emberc: error: {}", diag);
    }
    Ok(encoded)
}

fn cmd_emit_llvm(args: &EmitArgs) -> Result<i32> {
    let encoded = encode_snapshot(&args.input, &args.target.workspace())?;

    match &args.output {
        Some(path) => fs::write(path, &encoded.ir)
            .with_context(|| format!("cannot write {}", path.display()))?,
        None => print!("{}", encoded.ir),
    }

    if args.verify {
        verify_ir(&encoded.ir)?;
    }

    Ok(exit_code(&encoded))
}

fn cmd_build(args: &BuildArgs) -> Result<i32> {
    let encoded = encode_snapshot(&args.input, &args.target.workspace())?;
    if encoded.error_count() != 0 {
        return Ok(exit_code(&encoded));
    }

    let stem = args
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());

    let out_path = if let Some(ref output) = args.output {
        output.clone()
    } else if args.emit_asm {
        PathBuf::from(format!("{}.s", stem))
    } else if args.compile_only {
        PathBuf::from(format!("{}.o", stem))
    } else {
        PathBuf::from("a.out")
    };

    let dir = tempfile::tempdir()?;
    let ir_path = dir.path().join(format!("{}.ll", stem));
    fs::write(&ir_path, &encoded.ir)?;
    debug!("staged IR at {}", ir_path.display());

    let llc = resolve_tool("EMBERC_LLC", &["llc-18", "llc"])?;
    let mut llc_args = vec![ir_path.display().to_string()];
    if args.emit_asm {
        llc_args.push("-filetype=asm".to_string());
    } else {
        llc_args.push("-filetype=obj".to_string());
    }
    let obj_path = if args.emit_asm || args.compile_only {
        out_path.clone()
    } else {
        dir.path().join(format!("{}.o", stem))
    };
    llc_args.push("-o".to_string());
    llc_args.push(obj_path.display().to_string());
    if let Some(ref level) = args.opt {
        llc_args.push(format!("-O{}", level));
    }

    run_tool(&llc, &llc_args)?;
    if args.emit_asm || args.compile_only {
        return Ok(0);
    }

    let clang = resolve_tool("EMBERC_CLANG", &["clang-18", "clang"])?;
    let mut link_args = vec![
        "-no-pie".to_string(),
        obj_path.display().to_string(),
        "-o".to_string(),
        out_path.display().to_string(),
    ];
    if let Some(ref level) = args.opt {
        link_args.push(format!("-O{}", level));
    }
    run_tool(&clang, &link_args)?;

    Ok(0)
}

fn exit_code(encoded: &Encoded) -> i32 {
    encoded.error_count().min(125) as i32
}

fn resolve_tool(env: &str, candidates: &[&str]) -> Result<PathBuf> {
    if let Ok(path) = std::env::var(env) {
        return Ok(PathBuf::from(path));
    }
    for name in candidates {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
    }
    Err(anyhow!(
        "none of {:?} found; set ${} to the tool path",
        candidates,
        env
    ))
}

fn timeout_from_env() -> Option<Duration> {
    std::env::var("EMBERC_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn run_tool(tool: &Path, args: &[String]) -> Result<()> {
    let mut cmd = Command::new(tool);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    let status = run_with_timeout(cmd, timeout_from_env())
        .with_context(|| format!("failed to spawn {}", tool.display()))?;
    if !status.success() {
        return Err(anyhow!("{} failed with status: {}", tool.display(), status));
    }
    Ok(())
}

/// Spawn a tool in its own session so a timeout can take down the whole
/// process group.
fn run_with_timeout(
    mut cmd: Command,
    timeout: Option<Duration>,
) -> Result<std::process::ExitStatus> {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() != -1 {
                    Ok(())
                } else {
                    Err(std::io::Error::last_os_error())
                }
            });
        }
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {:?}", cmd))?;

    let Some(limit) = timeout else {
        return Ok(child.wait()?);
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if start.elapsed() >= limit {
            #[cfg(unix)]
            unsafe {
                let pgid = libc::getpgid(child.id() as libc::pid_t);
                if pgid > 1 {
                    let _ = libc::kill(-pgid, libc::SIGKILL);
                }
            }
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("process timed out after {}s", limit.as_secs()));
        }
        sleep(Duration::from_millis(50));
    }
}
