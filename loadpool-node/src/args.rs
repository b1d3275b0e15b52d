use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "loadpool-node")]
#[command(about = "Runs one member of a load-balanced server pool")]
#[command(version)]
pub(crate) struct Args {
    /// Path to the YAML config file
    #[arg(long)]
    pub(crate) config_file: String,

    /// Pool type tag (overrides the config file)
    #[arg(long = "type")]
    pub(crate) pool_type: Option<String>,

    /// Shared store address as host:port (overrides the config file)
    #[arg(long)]
    pub(crate) store_addr: Option<String>,

    /// Slots this member offers to the pool
    #[arg(long, default_value_t = 1000)]
    pub(crate) slots: usize,
}
