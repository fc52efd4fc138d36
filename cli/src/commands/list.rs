//! List command implementation

use anyhow::Result;
use clap::Args;
use numacopy_bench::error::describe;

use super::{BackendArgs, SelectionArgs};
use crate::backend::Backend;
use crate::output::{self, Level};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

pub fn run(args: ListArgs) -> Result<()> {
    let config = args.selection.load_config()?;
    let backend = Backend::open(args.backend.backend, args.backend.sim_devices)?;

    let generator = numacopy_bench::plan(&*backend.gpu, &*backend.numa, &config)?;
    for case in generator.cases()? {
        println!("{}", case.run_name());
    }

    if let Err(e) = generator.capabilities().check() {
        output::notice(
            Level::Warn,
            format_args!("every case would be skipped: {}", describe(&e)),
        );
    }

    Ok(())
}
