use anyhow::anyhow;
use bfsize::{
    bloom_filter_size_estimate, find_minimum_size, find_minimum_size_traced, query_fp_bound,
    sizing::TRACE_HEADER,
    utils::{parse_count, parse_probability},
    Containment, Params, Row,
};
use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Parser)]
pub struct Args {
    /// Verbose output, every probe of the model is logged to stderr
    #[clap(short, long)]
    verbose: bool,
    /// Bfsize commands
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    /// Determine the bloom filter size needed to meet a target query
    /// false positive rate
    Determine(Determine),
    /// Estimate the bloom filter size needed to meet a target bloom filter
    /// false positive rate. For an estimate based on the query false
    /// positive rate use the determine command.
    Estimate(Estimate),
    /// Compute the query false positive rate of given bloom filter sizes
    FpRate(FpRate),
}

#[derive(Debug, Parser)]
struct QueryArgs {
    /// (X) largest number of kmers in the set represented by a bloom filter,
    /// not including kmer false positives
    #[clap(short = 'X', long, value_parser = parse_count)]
    experiment: u64,
    /// (Q) largest number of kmers in a query
    #[clap(short = 'Q', long, value_parser = parse_count)]
    query: u64,
    /// (T) search theta, a query is reported as a match if this fraction
    /// of its kmers are present in the experiment; 0<value<1
    #[clap(short = 'T', long, value_parser = parse_probability)]
    theta: f64,
    /// (C) containment index, the fraction of a query's kmers that are
    /// present in the experiment. Use theta-<value> to give it relative
    /// to theta.
    #[clap(short = 'C', long)]
    containment: Containment,
    /// (H) number of hash functions
    #[clap(short = 'H', long, default_value_t = 1)]
    hashes: u32,
}

impl QueryArgs {
    fn params(&self) -> Result<Params, anyhow::Error> {
        let containment = self.containment.resolve(self.theta)?;
        let p = Params::new(self.experiment, self.query, self.theta, containment)
            .hashes(self.hashes);
        p.validate()?;
        Ok(p)
    }
}

#[derive(Debug, Parser)]
struct Determine {
    /// (QFP) target for query false positive rate, as a decimal,
    /// a percentage or a fraction
    #[clap(long = "queryfp", visible_alias = "queryfpr", value_parser = parse_probability)]
    query_fp: f64,
    #[clap(flatten)]
    query: QueryArgs,
    /// (M) how close we need to get, in number of bits of bloom filter size;
    /// the result we report will be a multiple of this
    #[clap(short = 'M', long, default_value = "1", value_parser = parse_count)]
    resolution: u64,
    /// Report parameters with the result
    #[clap(long)]
    show_parameters: bool,
    /// Report each step of the search
    #[clap(long)]
    show_search: bool,
}

#[derive(Debug, Parser)]
struct Estimate {
    /// Number of distinct kmers that will be represented by the bloom filter
    #[clap(value_parser = parse_count)]
    distinct_kmers: u64,
    /// Desired bloom filter false positive rate
    #[clap(value_parser = parse_probability)]
    fp_rate: f64,
    /// (H) number of hash functions
    #[clap(short = 'H', long, default_value_t = 1)]
    hashes: u32,
}

#[derive(Debug, Parser)]
struct FpRate {
    #[clap(flatten)]
    query: QueryArgs,
    /// Also report the upper bound of the query false positive rate for
    /// queries this far from theta
    #[clap(long, value_parser = parse_probability)]
    epsilon: Option<f64>,
    /// Bloom filter sizes, in bits
    #[clap(required = true, value_parser = parse_count)]
    sizes: Vec<u64>,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    init_logging(args.verbose);

    match args.command {
        Command::Determine(o) => {
            if o.query_fp == 0.0 {
                return Err(anyhow!(
                    "target query false positive rate cannot be exactly zero"
                ));
            }
            if o.query_fp == 1.0 {
                return Err(anyhow!(
                    "target query false positive rate cannot be exactly one"
                ));
            }

            let params = o.query.params()?;

            if !(o.show_parameters || o.show_search) {
                println!("{}", find_minimum_size(o.query_fp, &params, o.resolution)?);
                return Ok(());
            }

            let sizing = find_minimum_size_traced(o.query_fp, &params, o.resolution)?;

            println!("{TRACE_HEADER}");
            if o.show_search {
                for probe in &sizing.probes {
                    println!("{probe}");
                }
            }
            println!("{}", sizing.result_row(&params));
        }
        Command::Estimate(o) => {
            let bits = bloom_filter_size_estimate(o.distinct_kmers, o.fp_rate, o.hashes)?;
            println!("#numItems\tbfFP\tH\tB");
            println!("{}\t{:.6}\t{}\t{}", o.distinct_kmers, o.fp_rate, o.hashes, bits);
        }
        Command::FpRate(o) => {
            let params = o.query.params()?;

            match o.epsilon {
                Some(_) => println!("{TRACE_HEADER}\tqFPbound"),
                None => println!("{TRACE_HEADER}"),
            }

            for bf_size in o.sizes {
                let row = Row::new(bf_size, &params)?;

                match o.epsilon {
                    Some(eps) => {
                        let bound = query_fp_bound(bf_size, &params, eps)?;
                        println!("{row}\t{bound:.9}")
                    }
                    None => println!("{row}"),
                }
            }
        }
    }
    Ok(())
}
