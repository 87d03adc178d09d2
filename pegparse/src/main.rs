use std::{
    env, fs,
    io::{Write, stderr},
    path::Path,
    process,
};

use getopts::Options;
use pegpar::{CaseInsensitive, FrontEnd, node::DEFAULT_MAX_CHARS};
use pegram::{EbnfGrammar, Spanned};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod diagnostics;
use diagnostics::SpannedDiagnosticFormatter;

fn usage(prog: &str, msg: &str) -> ! {
    let path = Path::new(prog);
    let leaf = match path.file_name() {
        Some(m) => m.to_str().unwrap_or("pegparse"),
        None => "pegparse",
    };
    if !msg.is_empty() {
        writeln!(&mut stderr(), "{}", msg).ok();
    }
    writeln!(
        &mut stderr(),
        "Usage: {} [-q] [-t] [-g] [-i] <grammar.ebnf> <input file>",
        leaf
    )
    .ok();
    process::exit(1);
}

fn read_file(path: &str) -> String {
    match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            writeln!(&mut stderr(), "Can't read file {}: {}", path, e).ok();
            process::exit(1);
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args: Vec<String> = env::args().collect();
    let prog = &args[0];
    let matches = match Options::new()
        .optflag("h", "help", "")
        .optflag("q", "quiet", "Don't print the AST")
        .optflag("t", "tokens", "Print the tokens")
        .optflag("g", "grammar", "Print the token and AST grammars")
        .optflag(
            "i",
            "case-insensitive",
            "Compare characters case insensitively",
        )
        .parse(&args[1..])
    {
        Ok(m) => m,
        Err(f) => usage(prog, f.to_string().as_str()),
    };

    if matches.opt_present("h") {
        usage(prog, "");
    }

    if matches.free.len() != 2 {
        usage(prog, "Too few arguments given.");
    }

    let grm_path = &matches.free[0];
    let grm_src = read_file(grm_path);
    let grm = match EbnfGrammar::new(&grm_src) {
        Ok(x) => x,
        Err(errs) => {
            let formatter = SpannedDiagnosticFormatter::new(&grm_src, Path::new(grm_path));
            for e in errs {
                eprintln!(
                    "{}",
                    formatter.file_location_msg("Error", e.spans().first().copied())
                );
                eprintln!("{}\n", formatter.format_spanned(&e));
            }
            process::exit(1);
        }
    };
    debug!(
        tokens = grm.token_grammar().tags_len().as_storaget(),
        rules = grm.ast_grammar().rules_len().as_storaget(),
        "Grammar loaded"
    );

    if matches.opt_present("g") {
        println!("Token grammar:\n{}", grm.token_grammar().pp());
        println!("AST grammar:\n{}", grm.ast_grammar().pp());
    }

    let input_path = &matches.free[1];
    let input = read_file(input_path);
    let src = input.chars().collect::<Vec<_>>();
    let mut fe = FrontEnd::from_ebnf(&grm);
    if matches.opt_present("i") {
        fe = fe.comparator(&CaseInsensitive);
    }
    let res = fe.parse(&src);

    if matches.opt_present("t") {
        let tg = grm.token_grammar();
        for t in &res.tokens {
            println!(
                "{} {} {:?}",
                t.span,
                tg.tag_name(t.tidx),
                t.source_slice(&src[..], DEFAULT_MAX_CHARS)
            );
        }
    }

    if !matches.opt_present("q") {
        let ts = res.token_source(&src[..]);
        for n in &res.ast {
            print!("{}", n.pp(grm.ast_grammar(), &ts));
        }
    }

    if !res.errors.is_empty() {
        let formatter = SpannedDiagnosticFormatter::new(&input, Path::new(input_path));
        for e in &res.errors {
            let span = formatter.char_span_to_bytes(e.span());
            eprintln!(
                "{}",
                formatter.file_location_msg(&e.kind().to_string(), Some(span))
            );
            eprintln!("{}\n", formatter.format_parse_error(e));
        }
    }
    if !res.success {
        process::exit(1);
    }
}
