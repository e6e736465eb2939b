use anyhow::bail;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use serde::Deserialize;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use neuroguard_portal::Portal;
use neuroguard_portal::config::PortalConfig;
use neuroguard_portal::forms::{MedicalHistoryForm, validate_registration};
use neuroguard_portal::models::{Credentials, MedicalHistoryResponse, RegisterRequest};
use neuroguard_portal::routing::{self, GuardDecision, home_route};
use neuroguard_portal::session::Session;

#[derive(Parser, Debug)]
#[command(author, version, about = "NeuroGuard healthcare portal client", long_about = None)]
struct Args {
    /// Skip confirmation prompts for destructive actions
    #[arg(long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session token
    Login { username: String, password: String },
    /// Create an account from a JSON payload
    Register {
        /// Path to a JSON file with the registration fields
        file: PathBuf,
    },
    /// Log out and clear the stored session
    Logout,
    /// Show the current session
    Whoami,
    /// Run the route guard against a path and report where you land
    Open { path: String },
    /// Medical-history records
    #[command(subcommand)]
    History(HistoryCommand),
    /// File attachments
    #[command(subcommand)]
    Files(FilesCommand),
    /// Pick-lists for the record form
    #[command(subcommand)]
    Picklist(PicklistCommand),
}

#[derive(Subcommand, Debug)]
enum HistoryCommand {
    /// List all records you created (provider)
    List,
    /// Show one patient's record (provider)
    Get { patient_id: i64 },
    /// Show your own record (patient)
    Mine,
    /// List your assigned patients (caregiver)
    Assigned,
    /// Show an assigned patient's record (caregiver)
    ForPatient { patient_id: i64 },
    /// Create a record from a JSON draft (provider)
    Create {
        /// Path to a JSON draft of the form fields
        file: PathBuf,
    },
    /// Update a patient's record from a JSON draft (provider)
    Update { patient_id: i64, file: PathBuf },
    /// Delete a patient's record (provider)
    Delete { patient_id: i64 },
}

#[derive(Subcommand, Debug)]
enum FilesCommand {
    /// List files attached to your own record (patient)
    Mine,
    /// Upload a file to your own record (patient)
    Upload { path: PathBuf },
    /// Download a file attachment
    Download {
        file_id: i64,
        /// Name to save the file under
        file_name: String,
    },
    /// Delete a file from your own record (patient)
    Delete { file_id: i64 },
    /// Delete a file from a patient's record (provider)
    DeleteForPatient { patient_id: i64, file_id: i64 },
}

#[derive(Subcommand, Debug)]
enum PicklistCommand {
    Patients,
    Caregivers,
    Providers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neuroguard_portal=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PortalConfig::from_env();
    let portal = Portal::new(config)?;

    run(&portal, args).await
}

async fn run(portal: &Portal, args: Args) -> anyhow::Result<()> {
    match args.command {
        Command::Login { username, password } => {
            let session = portal
                .session
                .login(&Credentials { username, password })
                .await?;
            println!("Logged in as {} ({})", session.name, session.role);
            println!("Landing route: {}", home_route(session.role));
        }

        Command::Register { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let request: RegisterRequest = serde_json::from_str(&raw)?;
            if let Err(errors) = validate_registration(&request) {
                bail!("Registration form is invalid: {errors}");
            }
            let confirmation = portal.auth.register(&request).await?;
            println!("{}", confirmation.trim());
            println!("Registration successful! You can now log in.");
        }

        Command::Logout => {
            portal.session.logout().await;
            println!("Logged out. Landing route: /homePage");
        }

        Command::Whoami => match portal.session.current() {
            Some(session) => {
                println!("{} ({}), user id {}", session.name, session.role, session.user_id)
            }
            None => println!("Not logged in."),
        },

        Command::Open { path } => {
            let session = portal.session.current();
            let decision = routing::check_route(session.as_ref(), &path);
            match decision {
                GuardDecision::Allow => println!("{path}: allowed"),
                GuardDecision::RedirectToLogin => {
                    println!("{path}: redirected to {}", decision.destination(&path))
                }
                GuardDecision::RedirectToRestricted => {
                    println!("{path}: redirected to {}", decision.destination(&path))
                }
            }
        }

        Command::History(command) => run_history(portal, command, args.yes).await?,
        Command::Files(command) => run_files(portal, command, args.yes).await?,

        Command::Picklist(command) => {
            guard(portal, "/provider/medical-history")?;
            let users = match command {
                PicklistCommand::Patients => portal.medical_history.patients().await?,
                PicklistCommand::Caregivers => portal.medical_history.caregivers().await?,
                PicklistCommand::Providers => portal.medical_history.providers().await?,
            };
            for user in users {
                println!("{:>5}  {}  ({})", user.id, user.full_name(), user.username);
            }
        }
    }
    Ok(())
}

async fn run_history(portal: &Portal, command: HistoryCommand, yes: bool) -> anyhow::Result<()> {
    match command {
        HistoryCommand::List => {
            guard(portal, "/provider/medical-history")?;
            let records = portal.medical_history.provider_histories().await?;
            if records.is_empty() {
                println!("No medical histories yet.");
            }
            for record in records {
                print_record_line(&record);
            }
        }

        HistoryCommand::Get { patient_id } => {
            guard(portal, "/provider/medical-history")?;
            let record = portal.medical_history.provider_history(patient_id).await?;
            print_record(&record);
        }

        HistoryCommand::Mine => {
            guard(portal, "/patient/medical-history")?;
            let record = portal.medical_history.my_history().await?;
            print_record(&record);
        }

        HistoryCommand::Assigned => {
            guard(portal, "/caregiver/patients")?;
            for user in portal.medical_history.assigned_patients().await? {
                println!("{:>5}  {}  ({})", user.id, user.full_name(), user.username);
            }
        }

        HistoryCommand::ForPatient { patient_id } => {
            guard(portal, "/caregiver/patients")?;
            let record = portal
                .medical_history
                .patient_history_for_caregiver(patient_id)
                .await?;
            print_record(&record);
        }

        HistoryCommand::Create { file } => {
            guard(portal, "/provider/medical-history/new")?;
            let draft = read_draft(&file)?;
            let mut form = MedicalHistoryForm::new_create();
            apply_draft(&mut form, draft);
            submit_form(portal, &mut form, None).await?;
        }

        HistoryCommand::Update { patient_id, file } => {
            guard(portal, "/provider/medical-history/edit")?;
            let draft = read_draft(&file)?;
            let existing = portal.medical_history.provider_history(patient_id).await?;
            let mut form = MedicalHistoryForm::begin_load(patient_id);
            form.populate(&existing);
            apply_draft(&mut form, draft);
            submit_form(portal, &mut form, Some(patient_id)).await?;
        }

        HistoryCommand::Delete { patient_id } => {
            guard(portal, "/provider/medical-history")?;
            if !confirm(
                "Are you sure you want to delete this medical history?",
                yes,
            ) {
                println!("Cancelled.");
                return Ok(());
            }
            portal.medical_history.delete(patient_id).await?;
            println!("Medical history for patient {patient_id} deleted.");
        }
    }
    Ok(())
}

async fn run_files(portal: &Portal, command: FilesCommand, yes: bool) -> anyhow::Result<()> {
    match command {
        FilesCommand::Mine => {
            guard(portal, "/patient/medical-history")?;
            let files = portal.medical_history.my_files().await?;
            if files.is_empty() {
                println!("No files uploaded yet.");
            }
            for file in files {
                println!(
                    "{:>5}  {}  ({}, uploaded {})",
                    file.id, file.file_name, file.file_type, file.uploaded_at
                );
            }
        }

        FilesCommand::Upload { path } => {
            guard(portal, "/patient/medical-history")?;
            let uploaded = portal.medical_history.upload_my_file(&path).await?;
            println!("File uploaded successfully: {} (id {})", uploaded.file_name, uploaded.id);
        }

        FilesCommand::Download { file_id, file_name } => {
            guard(portal, "/files")?;
            let target = portal
                .medical_history
                .download_to(file_id, &file_name, &portal.config.download_dir)
                .await?;
            println!("Saved to {}", target.display());
        }

        FilesCommand::Delete { file_id } => {
            guard(portal, "/patient/medical-history")?;
            if !confirm("Are you sure you want to delete this file?", yes) {
                println!("Cancelled.");
                return Ok(());
            }
            portal.medical_history.delete_my_file(file_id).await?;
            println!("File deleted successfully.");
        }

        FilesCommand::DeleteForPatient { patient_id, file_id } => {
            guard(portal, "/provider/medical-history")?;
            if !confirm("Are you sure you want to delete this file?", yes) {
                println!("Cancelled.");
                return Ok(());
            }
            portal
                .medical_history
                .delete_patient_file(patient_id, file_id)
                .await?;
            println!("File deleted successfully.");
        }
    }
    Ok(())
}

/// Navigation gate: every screen-backed command passes here first.
fn guard(portal: &Portal, path: &str) -> anyhow::Result<()> {
    let session: Option<Session> = portal.session.current();
    match routing::check_route(session.as_ref(), path) {
        GuardDecision::Allow => Ok(()),
        GuardDecision::RedirectToLogin => {
            bail!("You are not logged in (redirected to /login). Run `login` first.")
        }
        GuardDecision::RedirectToRestricted => {
            bail!("Your role may not open {path} (redirected to /restricted).")
        }
    }
}

fn confirm(prompt: &str, assume_yes: bool) -> bool {
    if assume_yes {
        return true;
    }
    print!("{prompt} [y/N]: ");
    io::stdout().flush().ok();
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim(), "y" | "Y" | "yes" | "YES")
}

/// JSON shape of a form draft. Absent fields keep whatever the form
/// already holds (relevant in edit mode).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Draft {
    patient_id: Option<i64>,
    diagnosis: Option<String>,
    diagnosis_date: Option<NaiveDate>,
    progression_stage: Option<String>,
    genetic_risk: Option<String>,
    family_history: Option<String>,
    environmental_factors: Option<String>,
    comorbidities: Option<String>,
    medication_allergies: Option<String>,
    environmental_allergies: Option<String>,
    food_allergies: Option<String>,
    surgeries: Option<Vec<DraftSurgery>>,
    provider_names: Option<Vec<String>>,
    caregiver_names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftSurgery {
    #[serde(default)]
    description: String,
    date: Option<NaiveDate>,
}

fn read_draft(path: &PathBuf) -> anyhow::Result<Draft> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn apply_draft(form: &mut MedicalHistoryForm, draft: Draft) {
    if draft.patient_id.is_some() {
        form.patient_id = draft.patient_id;
    }
    if let Some(value) = draft.diagnosis {
        form.diagnosis = value;
    }
    if draft.diagnosis_date.is_some() {
        form.diagnosis_date = draft.diagnosis_date;
    }
    if let Some(value) = draft.progression_stage {
        form.progression_stage = value;
    }
    if let Some(value) = draft.genetic_risk {
        form.genetic_risk = value;
    }
    if let Some(value) = draft.family_history {
        form.family_history = value;
    }
    if let Some(value) = draft.environmental_factors {
        form.environmental_factors = value;
    }
    if let Some(value) = draft.comorbidities {
        form.comorbidities = value;
    }
    if let Some(value) = draft.medication_allergies {
        form.medication_allergies = value;
    }
    if let Some(value) = draft.environmental_allergies {
        form.environmental_allergies = value;
    }
    if let Some(value) = draft.food_allergies {
        form.food_allergies = value;
    }
    if let Some(surgeries) = draft.surgeries {
        form.surgeries = surgeries
            .into_iter()
            .map(|s| neuroguard_portal::forms::medical_history::SurgeryEntry {
                description: s.description,
                date: s.date,
            })
            .collect();
    }
    if let Some(names) = draft.provider_names {
        form.set_provider_names(names);
    }
    if let Some(names) = draft.caregiver_names {
        form.set_caregiver_names(names);
    }
}

/// Validate, serialize, and send the form; the busy state is entered
/// before dispatch and resolved in the completion arm.
async fn submit_form(
    portal: &Portal,
    form: &mut MedicalHistoryForm,
    update_patient_id: Option<i64>,
) -> anyhow::Result<()> {
    let request = match form.try_begin_submit() {
        Ok(request) => request,
        Err(e) => bail!("{e}"),
    };

    let result = match update_patient_id {
        Some(patient_id) => portal.medical_history.update(patient_id, &request).await,
        None => portal.medical_history.create(&request).await,
    };

    match result {
        Ok(saved) => {
            form.finish_submit(true);
            let action = if update_patient_id.is_some() { "updated" } else { "created" };
            println!(
                "Medical history {action} for {} (record id {}).",
                saved.patient_name, saved.id
            );
            Ok(())
        }
        Err(e) => {
            form.finish_submit(false);
            bail!("Submission failed: {e}");
        }
    }
}

fn print_record_line(record: &MedicalHistoryResponse) {
    println!(
        "{:>5}  {}  {}  stage {}",
        record.patient_id,
        record.patient_name,
        record.diagnosis.as_deref().unwrap_or("-"),
        record.progression_stage.as_deref().unwrap_or("-"),
    );
}

fn print_record(record: &MedicalHistoryResponse) {
    println!("Patient:       {} (id {})", record.patient_name, record.patient_id);
    println!("Diagnosis:     {}", record.diagnosis.as_deref().unwrap_or("-"));
    println!(
        "Diagnosed on:  {}",
        record
            .diagnosis_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "Stage:         {}",
        record.progression_stage.as_deref().unwrap_or("-")
    );
    if let Some(risk) = &record.genetic_risk {
        println!("Genetic risk:  {risk}");
    }
    if !record.surgeries.is_empty() {
        println!("Surgeries:");
        for surgery in &record.surgeries {
            println!("  - {} ({})", surgery.description, surgery.date);
        }
    }
    if !record.provider_names.is_empty() {
        println!("Providers:     {}", record.provider_names.join(", "));
    }
    if !record.caregiver_names.is_empty() {
        println!("Caregivers:    {}", record.caregiver_names.join(", "));
    }
    if !record.files.is_empty() {
        println!("Files:");
        for file in &record.files {
            println!("  - {} (id {})", file.file_name, file.id);
        }
    }
}
