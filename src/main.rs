use clap::Parser;
use routeplan::args::{self, Routeplan};
use routeplan::config::Config;
use routeplan::ir::Plan;
use routeplan::tlog;

fn main() {
    let code = match Routeplan::parse() {
        Routeplan::Explain(args) => main_explain(args),
    };
    std::process::exit(code);
}

fn main_explain(args: args::Explain) -> i32 {
    let config = match Config::init(&args.config, args.log_level) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };
    tlog::set_log_level(config.log_level().into());
    tlog!(Debug, "configuration loaded"; "path" => &args.config, "keyspaces" => config.schema.keyspaces.len());

    let explain = Plan::from_sql(&args.sql, &config.schema).and_then(|plan| plan.as_explain());
    match explain {
        Ok(explain) => {
            print!("{explain}");
            0
        }
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}
