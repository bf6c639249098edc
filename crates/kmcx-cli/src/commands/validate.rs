use super::load;
use crate::cli::ValidateArgs;
use crate::error::CliError;
use colored::Colorize;
use kmcx_core::engine::{EngineError, EngineHandle, OfflineEngine};
use kmcx_core::job::{load_batch, JobConfiguration};
use kmcx_core::job_list::{validate_batch, JobList};
use kmcx_core::stages::Stage;
use kmcx_core::task::{FatalError, TaskResult};

/// Pushes one job through a fresh offline engine and returns the input
/// file it would produce.
pub fn render(job: &JobConfiguration) -> Result<String, CliError> {
    let mut engine = OfflineEngine::prepared(Stage::ALL.len());
    let context = format!("Job {}", job.id());
    let rendered = job.apply_data(&mut engine).and_then(|()| {
        engine
            .serialize_settings()
            .map_err(|code| EngineError::Contract {
                operation: "Serialize".to_string(),
                code,
            })
    });
    match rendered {
        Ok(text) => Ok(text),
        Err(err) => match TaskResult::<()>::from_engine_error(&context, err) {
            TaskResult::UserMessage(msg) => Err(CliError::Message(msg)),
            TaskResult::Fatal(fatal) => Err(CliError::Fatal(fatal)),
            _ => Err(CliError::Fatal(FatalError::new(context, "unexpected engine outcome"))),
        },
    }
}

pub fn handle_validate(args: ValidateArgs) -> Result<(), CliError> {
    let loaded = load()?;
    let batch = load_batch(&args.batch)?;
    validate_batch(&batch.jobs)?;

    let mut list = JobList::new(loaded.config.max_job_count);
    list.restore(batch.jobs)?;

    for job in list.iter() {
        let input = render(job)?;
        if args.render {
            println!("{}", format!("# job {}", job.id()).bold());
            print!("{}", input);
            if !input.ends_with('\n') {
                println!();
            }
        }
    }

    println!(
        "{} {} job(s) in {} are valid",
        "OK".green().bold(),
        list.len(),
        args.batch.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_default_job() {
        let text = render(&JobConfiguration::draft()).unwrap();
        assert!(text.contains("Temperature = "));
    }
}
