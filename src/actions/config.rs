use crate::actions::{CliActionError, CliContext};
use tracing::trace;

pub fn show_configuration(context: &CliContext) -> Result<(), CliActionError> {
    trace!("Executing 'config show' command");
    context.print(&context.configuration)
}

pub fn print_configuration_path(context: &CliContext) -> Result<(), CliActionError> {
    println!("{}", context.configuration_path.display());
    Ok(())
}
