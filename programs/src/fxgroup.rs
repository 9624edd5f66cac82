use std::io::Write;
use std::path::Path;
use std::process;

extern crate env_logger;
#[macro_use]
extern crate log;
extern crate termcolor;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
#[macro_use]
extern crate clap;
use clap::{App, Arg, ArgGroup, SubCommand};

extern crate fxgroup;
use fxgroup::errors::{Error, Result};
use fxgroup::input_buffer::InputBuffer;
use fxgroup::{BareStage, Diagnostic, Stage, Strictness, TextureEffectGroup};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run() {
        Ok(()) => {}
        Err(err) => {
            drop(write_err(err));
            process::exit(1);
        }
    }
}

fn write_err(err: Error) -> Result<()> {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    write!(&mut stderr, "error: ")?;
    stderr.set_color(&ColorSpec::new())?;
    writeln!(&mut stderr, "{}", err)?;
    for cause in err.iter().skip(1) {
        writeln!(&mut stderr, "  caused by: {}", cause)?;
    }
    if let Some(backtrace) = err.backtrace() {
        writeln!(&mut stderr, "{:?}", backtrace)?;
    }
    Ok(())
}

fn cli_app() -> App<'static, 'static> {
    clap_app!(fxgroup =>
        (about: "Inspect and edit texture effect group files")
        (@arg file: +required "Effect group file, or - for stdin")
        (@subcommand info =>
            (about: "Print what each stage does")
            (@arg verbose: -v --verbose "Print wire-level details and diagnostics")
        )
        (@subcommand check =>
            (about: "Look for problems, and fail if there are any real ones")
            (@arg strict: --strict "Treat unknown stage kinds as errors instead of disabled stages")
        )
        (@subcommand normalize =>
            (about: "Rewrite the group in the current canonical form")
            (@arg outfile: +required "Output file")
        )
    ).subcommand(edit_subcommand())
}

// Built by hand because `override` is a keyword, and clap_app! wants an identifier
fn edit_subcommand() -> App<'static, 'static> {
    SubCommand::with_name("edit")
        .about("Change one stage and save the group")
        .arg(Arg::with_name("stage").short("s").long("stage").takes_value(true).required(true)
            .help("Stage slot to change, 0 or 1"))
        .arg(Arg::with_name("disable").long("disable")
            .help("Disable the stage"))
        .arg(Arg::with_name("override").long("override").takes_value(true).value_name("SRC")
            .help("Make the stage behave like stage SRC"))
        .arg(Arg::with_name("script").long("script").takes_value(true)
            .help("Evaluate the stage with this script"))
        .arg(Arg::with_name("channel").short("c").long("channel").takes_value(true)
            .conflicts_with("disable")
            .help("Channel the stage applies to"))
        .arg(Arg::with_name("defaults").short("d").long("defaults").takes_value(true)
            .conflicts_with_all(&["override", "disable"])
            .help("Comma-separated default values for the script"))
        .arg(Arg::with_name("output").short("o").long("output").takes_value(true)
            .help("Write here instead of back to the input file"))
        .group(ArgGroup::with_name("mode").args(&["disable", "override", "script"]))
}

fn run() -> Result<()> {
    let args = cli_app().get_matches();

    let filename = args.value_of("file").unwrap_or("-");

    // Dispatch!
    match args.subcommand() {
        ("info", Some(subargs)) => { do_info(filename, subargs)? },
        ("check", Some(subargs)) => { do_check(filename, subargs)? },
        ("normalize", Some(subargs)) => { do_normalize(filename, subargs)? },
        ("edit", Some(subargs)) => { do_edit(filename, subargs)? },
        _ => { println!("{}", args.usage()); },
    }

    Ok(())
}

fn do_info(filename: &str, subargs: &clap::ArgMatches) -> Result<()> {
    let input = InputBuffer::open(filename)?;
    let bare = fxgroup::parse_effect_group(input.bytes())?;
    let group = TextureEffectGroup::from_bare(&bare, Strictness::Lenient)?;

    print!("{}", group);

    if subargs.is_present("verbose") {
        println!("");
        println!("format version {}, {} bytes", bare.version, bare.buffer.len());
        println!("declared stage count {}", bare.stage_count);
        for (slot, stage) in bare.stages.iter().enumerate() {
            match *stage {
                BareStage::Evaluated { script, default_count, .. } => {
                    println!("stage {}: {}-byte script name, {} default values stored", slot, script.len(), default_count);
                }
                BareStage::Unknown(kind) => {
                    println!("stage {}: kind {}, read as disabled", slot, kind);
                }
                _ => {}
            }
        }
        if bare.trailing_bytes > 0 {
            println!("{} trailing bytes", bare.trailing_bytes);
        }

        let diagnostics = all_diagnostics(bare.diagnose(), &group);
        if !diagnostics.is_empty() {
            println!("");
            print_diagnostics(&diagnostics);
        }
    }

    Ok(())
}

fn do_check(filename: &str, subargs: &clap::ArgMatches) -> Result<()> {
    let strictness =
        if subargs.is_present("strict") { Strictness::Strict }
        else { Strictness::Lenient }
    ;

    let input = InputBuffer::open(filename)?;
    let bare = fxgroup::parse_effect_group(input.bytes())?;
    let group = TextureEffectGroup::from_bare(&bare, strictness)?;

    let diagnostics = all_diagnostics(bare.diagnose(), &group);
    print_diagnostics(&diagnostics);

    let errors = diagnostics.iter().filter(|diagnostic| diagnostic.is_error()).count();
    if errors > 0 {
        return Err(format!("{} problem(s) found in {}", errors, filename).into());
    }
    if diagnostics.is_empty() {
        println!("{}: ok", filename);
    }
    Ok(())
}

fn do_normalize(filename: &str, subargs: &clap::ArgMatches) -> Result<()> {
    let input = InputBuffer::open(filename)?;
    let group = TextureEffectGroup::from_bytes(input.bytes())?;
    // The input may be the same file as the output, and it's still mapped
    drop(input);

    let outfile = subargs.value_of("outfile").unwrap_or(filename);
    fxgroup::save_effect_group(outfile, &group)?;
    info!("wrote {}", outfile);
    Ok(())
}

fn do_edit(filename: &str, subargs: &clap::ArgMatches) -> Result<()> {
    let slot: usize = parse_number(subargs.value_of("stage").unwrap_or(""), "stage")?;
    if slot >= fxgroup::STAGE_SLOTS {
        return Err(format!("there are only {} stages; got stage {}", fxgroup::STAGE_SLOTS, slot).into());
    }

    let output = match (subargs.value_of("output"), filename) {
        (Some(output), _) => output,
        (None, "-") => { return Err("need --output when reading from stdin".into()); }
        (None, filename) => filename,
    };

    let mut group =
        if filename != "-" && !Path::new(filename).exists() {
            info!("{} doesn't exist yet; starting from an empty group", filename);
            TextureEffectGroup::new()
        }
        else {
            let input = InputBuffer::open(filename)?;
            TextureEffectGroup::from_bytes(input.bytes())?
        }
    ;

    let new_stage = edited_stage(slot, &group.stages[slot], subargs)?;
    group.stages[slot] = new_stage;
    for diagnostic in group.diagnose() {
        warn!("{}", diagnostic);
    }
    fxgroup::save_effect_group(output, &group)?;
    print!("{}", group);
    Ok(())
}

/// Work out what a stage becomes, given its current state and the `edit` flags.  clap has already
/// ruled out conflicting flags.
fn edited_stage(slot: usize, old_stage: &Stage, subargs: &clap::ArgMatches) -> Result<Stage> {
    if subargs.is_present("disable") {
        return Ok(Stage::Disabled);
    }

    let channel = match subargs.value_of("channel") {
        Some(value) => parse_number(value, "channel")?,
        None => old_stage.channel().unwrap_or(0),
    };
    let defaults = match subargs.value_of("defaults") {
        Some(value) => Some(parse_defaults(value)?),
        None => None,
    };

    if let Some(value) = subargs.value_of("override") {
        return Ok(Stage::overridden(channel, parse_number(value, "source stage")?));
    }
    if let Some(script) = subargs.value_of("script") {
        let defaults = defaults.unwrap_or_else(|| {
            old_stage.defaults().map(|values| values.to_vec()).unwrap_or_default()
        });
        return Ok(Stage::evaluated(channel, script, &defaults));
    }

    // No new kind, so tweak whatever's already there
    match *old_stage {
        Stage::Disabled => {
            Err(format!("stage {} is disabled; pass --override or --script to enable it", slot).into())
        }
        Stage::Overridden { source_stage, .. } => {
            if defaults.is_some() {
                return Err(format!("stage {} is an override and has no defaults", slot).into());
            }
            Ok(Stage::overridden(channel, source_stage))
        }
        Stage::Evaluated { ref script, defaults: ref old_defaults, .. } => {
            let defaults = defaults.unwrap_or_else(|| old_defaults.to_vec());
            Ok(Stage::evaluated(channel, script.clone(), &defaults))
        }
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T> {
    value.trim().parse()
        .map_err(|_| format!("{} must be a non-negative integer, got {:?}", what, value).into())
}

fn parse_defaults(value: &str) -> Result<Vec<f32>> {
    let values = value.split(',')
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f32>().map_err(|_| format!("bad default value {:?}", part)))
        .collect::<std::result::Result<Vec<f32>, String>>()?;
    if values.len() > fxgroup::DEFAULT_VALUE_SLOTS {
        return Err(format!("at most {} default values fit in a stage, got {}", fxgroup::DEFAULT_VALUE_SLOTS, values.len()).into());
    }
    Ok(values)
}

fn all_diagnostics(mut diagnostics: Vec<Diagnostic>, group: &TextureEffectGroup) -> Vec<Diagnostic> {
    diagnostics.extend(group.diagnose());
    diagnostics
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    for diagnostic in diagnostics {
        let (label, color) =
            if diagnostic.is_error() { ("error", Color::Red) }
            else { ("warning", Color::Yellow) }
        ;
        drop(stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true)));
        drop(write!(&mut stdout, "{}: ", label));
        drop(stdout.reset());
        drop(writeln!(&mut stdout, "{}", diagnostic));
    }
}
