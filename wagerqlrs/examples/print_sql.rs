use std::env;

use wagerql::{
    columns::ColumnRegistry,
    compiler::QueryCompiler,
    dialect::{Dialect, DuckDbDialect, PostgresDialect},
    request::{CustomGraphParams, DimensionalParams, DistinctParams, TimeSeriesParams},
    PageLimits, SpecBuilder,
};

fn usage() {
    eprintln!("Usage: print_sql [--duckdb] <time-series|dimensional|custom-graph|distinct> <params_json>");
    eprintln!(
        r#"Example: cargo run --example print_sql -- dimensional '{{"dimension":"sport","clientId":"c1"}}'"#
    );
}

fn main() -> anyhow::Result<()> {
    let mut args = env::args().skip(1).collect::<Vec<_>>();
    let duckdb = args.first().is_some_and(|a| a == "--duckdb");
    if duckdb {
        args.remove(0);
    }
    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    let dialect: &dyn Dialect = if duckdb { &DuckDbDialect } else { &PostgresDialect };
    let registry = ColumnRegistry::builtin();
    let builder = SpecBuilder::new(&registry, PageLimits::default());
    let compiler = QueryCompiler::new(dialect, registry.table());

    let kind = args.remove(0);
    let params = args.remove(0);
    let pair = match kind.as_str() {
        "time-series" => {
            let params: TimeSeriesParams = serde_json::from_str(&params)?;
            compiler.compile(&builder.build_time_series(&params)?)
        }
        "dimensional" => {
            let params: DimensionalParams = serde_json::from_str(&params)?;
            compiler.compile(&builder.build_dimensional(&params)?)
        }
        "custom-graph" => {
            let params: CustomGraphParams = serde_json::from_str(&params)?;
            compiler.compile(&builder.build_custom_graph(&params)?)
        }
        "distinct" => {
            let params: DistinctParams = serde_json::from_str(&params)?;
            let query = compiler.compile_distinct(&builder.build_distinct(&params)?);
            println!("{}\n  params: {:?}", query.sql, query.params);
            return Ok(());
        }
        other => anyhow::bail!("unknown query kind `{other}`"),
    };

    println!("{}\n  params: {:?}", pair.data.sql, pair.data.params);
    println!("{}\n  params: {:?}", pair.count.sql, pair.count.params);
    Ok(())
}
