//! Interactive session state
//!
//! A [`Session`] owns the configuration, the case manager and the open case.
//! Every operation the menus offer is a method here: it checks its
//! preconditions, runs one tool or library call and journals the outcome.
//! Failures are returned to the caller, which reports them through
//! [`Session::record_failure`].

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::analysis::context::{self, AnalysisKind};
use crate::analysis::{ileapp, search, SearchHit, SearchReport};
use crate::case::{
    Case, CaseManager, EvidenceItem, EvidenceKind, Platform, VerificationRecord, ANDROID_DIR,
    ANDROID_PULLED_DIR, IOS_DIR,
};
use crate::common::path_security::{is_plain_component, remote_basename, safe_join};
use crate::config::ToolkitConfig;
use crate::device::android::{AndroidInfo, DeviceDiagnosis};
use crate::device::{AdbClient, IosClient, IosDeviceInfo, ToolRunner};
use crate::error::{ToolkitError, ToolkitResult};
use crate::extract::{self, ab::DecodeSummary, ListedFile};
use crate::report::{self, GeneratedReport};

/// Backups smaller than this usually mean the device refused the request
pub const SUSPICIOUS_BACKUP_SIZE: u64 = 1024;

/// Input for an AI analysis request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiTarget {
    /// A case file; SQLite databases send their schema, other files an excerpt
    File(String),
    /// Hits of the most recent keyword search
    KeywordHits,
}

/// Prompt ready to be sent to the assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiRequest {
    pub kind: AnalysisKind,
    pub source: String,
    pub prompt: String,
}

/// True when the process runs with effective uid 0
#[cfg(unix)]
pub fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn running_as_root() -> bool {
    false
}

/// `dir/<stem>.<ext>`, or `dir/<stem>_<n>.<ext>` when earlier acquisitions exist
pub fn next_free_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let first = dir.join(format!("{}.{}", stem, ext));
    if !first.exists() {
        return first;
    }
    (2u32..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// `dir/<stem>`, or `dir/<stem>_<n>` for directory acquisitions
pub fn next_free_dir(dir: &Path, stem: &str) -> PathBuf {
    let first = dir.join(stem);
    if !first.exists() {
        return first;
    }
    (2u32..)
        .map(|n| dir.join(format!("{}_{}", stem, n)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

pub struct Session {
    config: ToolkitConfig,
    cases: CaseManager,
    case: Option<Case>,
    last_search: Option<SearchReport>,
}

impl Session {
    pub fn new(config: ToolkitConfig) -> Self {
        let cases = CaseManager::new(config.acquisition_dir.clone());
        Self {
            config,
            cases,
            case: None,
            last_search: None,
        }
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    pub fn cases(&self) -> &CaseManager {
        &self.cases
    }

    pub fn active_case(&self) -> Option<&Case> {
        self.case.as_ref()
    }

    pub fn last_search(&self) -> Option<&SearchReport> {
        self.last_search.as_ref()
    }

    pub fn require_case(&self) -> ToolkitResult<&Case> {
        self.case.as_ref().ok_or(ToolkitError::NoActiveCase)
    }

    fn require_case_mut(&mut self) -> ToolkitResult<&mut Case> {
        self.case.as_mut().ok_or(ToolkitError::NoActiveCase)
    }

    /// Journal a failed operation in the open case, if any
    pub fn record_failure(&self, operation: &str, error: &ToolkitError) {
        warn!(operation, category = error.category(), error = %error, "Operation failed");
        if let Some(case) = &self.case {
            let message = format!("{} failed [{}]: {}", operation, error.category(), error);
            if let Err(e) = case.log("Error", &message, None) {
                warn!(error = %e, "Could not journal failure");
            }
        }
    }

    // Cases

    pub fn create_case(&mut self, name: &str, investigator: &str) -> ToolkitResult<&Case> {
        let case = self.cases.create(name, investigator)?;
        self.last_search = None;
        Ok(self.case.insert(case))
    }

    pub fn open_case(&mut self, name: &str) -> ToolkitResult<&Case> {
        let case = self.cases.open(name)?;
        self.last_search = None;
        Ok(self.case.insert(case))
    }

    pub fn list_cases(&self) -> ToolkitResult<Vec<String>> {
        self.cases.list()
    }

    // Tools

    fn runner(&self) -> ToolRunner {
        match &self.case {
            Some(case) => ToolRunner::with_transcript(case.transcript_path()),
            None => ToolRunner::new(),
        }
    }

    pub fn adb(&self) -> AdbClient {
        AdbClient::new(self.config.tools.adb.clone(), self.runner())
    }

    pub fn ios(&self) -> IosClient {
        IosClient::new(
            self.config.tools.ideviceinfo.clone(),
            self.config.tools.idevicebackup2.clone(),
            self.runner(),
        )
    }

    fn log_if_open(&self, action: &str, message: &str) -> ToolkitResult<()> {
        match &self.case {
            Some(case) => case.log(action, message, None),
            None => Ok(()),
        }
    }

    // Android

    pub fn android_diagnose(&self) -> ToolkitResult<DeviceDiagnosis> {
        let diagnosis = self.adb().diagnose()?;
        let status = match &diagnosis.best {
            Some(state) => format!("Device found, state: {}", state.describe()),
            None => "No device detected".to_string(),
        };
        let root = match diagnosis.root {
            Some(true) => ", root available",
            Some(false) => ", root not available",
            None => "",
        };
        self.log_if_open("Diagnostic", &format!("{}{}", status, root))?;
        Ok(diagnosis)
    }

    pub fn android_info(&self) -> ToolkitResult<AndroidInfo> {
        let info = self.adb().info()?;
        self.log_if_open(
            "Device info",
            &format!("Android device: model {}, Android {}", info.model, info.android_version),
        )?;
        Ok(info)
    }

    pub fn android_packages(&self) -> ToolkitResult<Vec<String>> {
        let packages = self.adb().list_packages()?;
        self.log_if_open("App list", &format!("{} installed packages listed", packages.len()))?;
        Ok(packages)
    }

    /// `adb backup -all -apk -shared` into `Android_Acquisition/`
    pub fn android_full_backup(&mut self, sink: &mut dyn FnMut(&str)) -> ToolkitResult<EvidenceItem> {
        let case = self.require_case()?;
        let adb = self.adb();
        let device = adb.require_authorized()?;
        let dest = next_free_path(&case.subdir(ANDROID_DIR)?, "full_backup", "ab");
        case.log(
            "Android backup",
            &format!(
                "Full backup started from {} into {}",
                device.serial,
                case.relative_path(&dest)?
            ),
            None,
        )?;

        adb.backup_full(&dest, sink)?;
        let description = format!("adb backup -all -apk -shared from {}", device.serial);
        self.require_case_mut()?
            .record_evidence(&dest, Platform::Android, EvidenceKind::FullBackup, &description)
    }

    /// `adb backup -noapk <package>` into `Android_Acquisition/<package>.ab`
    pub fn android_app_backup(
        &mut self,
        package: &str,
        sink: &mut dyn FnMut(&str),
    ) -> ToolkitResult<EvidenceItem> {
        let package = package.trim();
        crate::device::android::validate_package_name(package)?;
        let case = self.require_case()?;
        let adb = self.adb();
        let device = adb.require_authorized()?;
        let dest = next_free_path(&case.subdir(ANDROID_DIR)?, package, "ab");
        case.log(
            "Android backup",
            &format!("Backup of {} started from {}", package, device.serial),
            None,
        )?;

        adb.backup_app(&dest, package, sink)?;
        let description = format!("adb backup -noapk {} from {}", package, device.serial);
        self.require_case_mut()?
            .record_evidence(&dest, Platform::Android, EvidenceKind::AppBackup, &description)
    }

    /// `adb logcat -d` into `Android_Acquisition/logcat.txt`
    pub fn android_logcat(&mut self) -> ToolkitResult<EvidenceItem> {
        let case = self.require_case()?;
        let adb = self.adb();
        let device = adb.require_authorized()?;
        let dest = next_free_path(&case.subdir(ANDROID_DIR)?, "logcat", "txt");
        case.log("Logcat", &format!("Log buffer dump started from {}", device.serial), None)?;

        let bytes = adb.logcat(&dest)?;
        info!(bytes, "Logcat captured");
        let description = format!("adb logcat -d from {}", device.serial);
        self.require_case_mut()?
            .record_evidence(&dest, Platform::Android, EvidenceKind::Logcat, &description)
    }

    /// `adb pull <remote>` into `Android_Acquisition/Pulled_Files/<basename>`
    pub fn android_pull(&mut self, remote: &str, sink: &mut dyn FnMut(&str)) -> ToolkitResult<EvidenceItem> {
        let remote = remote.trim();
        if remote.is_empty() {
            return Err(ToolkitError::InvalidInput("device path is empty".to_string()));
        }
        let name = remote_basename(remote)
            .filter(|n| is_plain_component(n))
            .ok_or_else(|| {
                ToolkitError::InvalidInput(format!("cannot derive a file name from '{}'", remote))
            })?;

        let case = self.require_case()?;
        let adb = self.adb();
        let device = adb.require_authorized()?;
        let dest = case.subdir(ANDROID_PULLED_DIR)?.join(&name);
        if dest.exists() {
            return Err(ToolkitError::InvalidInput(format!(
                "{}/{} already exists; pulled files are not overwritten",
                ANDROID_PULLED_DIR, name
            )));
        }
        case.log("Pull", &format!("Pull of '{}' started from {}", remote, device.serial), None)?;

        adb.pull(remote, &dest, sink)?;
        let description = format!("adb pull {} from {}", remote, device.serial);
        self.require_case_mut()?
            .record_evidence(&dest, Platform::Android, EvidenceKind::PulledFile, &description)
    }

    /// Confirm a device directory exists before the browser enters it
    pub fn android_dir_accessible(&self, path: &str) -> ToolkitResult<bool> {
        self.adb().dir_accessible(path)
    }

    pub fn android_list_dir(&self, path: &str) -> ToolkitResult<String> {
        self.adb().list_dir(path)
    }

    /// Authorized device required before browsing
    pub fn android_require_device(&self) -> ToolkitResult<()> {
        self.adb().require_authorized().map(|_| ())
    }

    /// Decode an `.ab` file, given relative to the case or as an absolute path
    pub fn decode_backup(&mut self, input: &str) -> ToolkitResult<(DecodeSummary, EvidenceItem)> {
        let path = self.resolve_input(input)?;
        let case = self.require_case_mut()?;
        case.log("Decode", &format!("Decoding Android backup {}", path.display()), None)?;
        extract::decode_into_case(case, &path)
    }

    fn resolve_input(&self, input: &str) -> ToolkitResult<PathBuf> {
        let case = self.require_case()?;
        let input = input.trim();
        if input.is_empty() {
            return Err(ToolkitError::InvalidInput("path is empty".to_string()));
        }
        let path = Path::new(input);
        if path.is_absolute() {
            if !path.exists() {
                return Err(ToolkitError::InvalidInput(format!("{} does not exist", input)));
            }
            Ok(path.to_path_buf())
        } else {
            Ok(safe_join(case.dir(), input)?)
        }
    }

    // iOS

    pub fn ios_info(&self) -> ToolkitResult<IosDeviceInfo> {
        let info = self.ios().info()?;
        let name = info.get("DeviceName").unwrap_or("unknown device");
        let version = info.get("ProductVersion").unwrap_or("unknown version");
        self.log_if_open("Device info", &format!("iOS device: {}, iOS {}", name, version))?;
        Ok(info)
    }

    /// `idevicebackup2 backup --full` into a fresh `iOS_Acquisition/backup[_n]/`
    pub fn ios_full_backup(&mut self, sink: &mut dyn FnMut(&str)) -> ToolkitResult<EvidenceItem> {
        let case = self.require_case()?;
        let ios = self.ios();
        let device = match ios.info() {
            Ok(info) if !info.properties.is_empty() => info,
            Ok(_) => return Err(ToolkitError::NoDevice("no iOS device detected".to_string())),
            Err(ToolkitError::ToolFailed { tail, .. }) => return Err(ToolkitError::NoDevice(tail)),
            Err(e) => return Err(e),
        };
        let udid = device.get("UniqueDeviceID").unwrap_or("unknown UDID").to_string();
        let dest = next_free_dir(&case.subdir(IOS_DIR)?, "backup");
        std::fs::create_dir_all(&dest)?;
        case.log(
            "iOS backup",
            &format!("Full backup started from {} into {}", udid, case.relative_path(&dest)?),
            None,
        )?;

        if let Err(e) = ios.backup_full(&dest, sink) {
            // Only an untouched folder is removed; partial output stays for review
            let _ = std::fs::remove_dir(&dest);
            return Err(e);
        }
        let description = format!("idevicebackup2 backup --full from {}", udid);
        self.require_case_mut()?
            .record_evidence(&dest, Platform::Ios, EvidenceKind::FullBackup, &description)
    }

    // Guided procedures

    pub fn procedure_started(&self, procedure: &str) -> ToolkitResult<()> {
        self.require_case()?
            .log(procedure, "Guided procedure started", None)
    }

    pub fn procedure_finished(&self, procedure: &str) -> ToolkitResult<()> {
        self.require_case()?.log(
            procedure,
            "Guided procedure finished; acquisition continues manually and acquired files must be added to the case folder",
            None,
        )
    }

    /// Free-text note from the examiner, e.g. commands run by hand
    pub fn add_note(&self, note: &str) -> ToolkitResult<()> {
        let note = note.trim();
        if note.is_empty() {
            return Err(ToolkitError::InvalidInput("note is empty".to_string()));
        }
        self.require_case()?.log("Note", note, None)
    }

    // Evidence

    pub fn verify_evidence(&self) -> ToolkitResult<Vec<VerificationRecord>> {
        self.require_case()?.verify_evidence()
    }

    pub fn list_files(&self, subdir: &str) -> ToolkitResult<Vec<ListedFile>> {
        extract::list_files(self.require_case()?, subdir)
    }

    pub fn export_file(&mut self, relative: &str) -> ToolkitResult<EvidenceItem> {
        extract::export_file(self.require_case_mut()?, relative)
    }

    // Analysis

    /// Whole-word search over the case folder; hits stream to `on_hit`
    pub fn keyword_search(
        &mut self,
        input: &str,
        on_hit: &mut dyn FnMut(&SearchHit),
    ) -> ToolkitResult<SearchReport> {
        let keywords = search::parse_keywords(input);
        let case = self.require_case()?;
        if keywords.is_empty() {
            return Err(ToolkitError::InvalidInput("no keywords given".to_string()));
        }
        case.log("Keyword search", &format!("Search started for: {}", keywords.join(", ")), None)?;

        let report = search::search_tree(
            case.dir(),
            &keywords,
            &|relative| report::is_excluded(case, relative),
            on_hit,
        )?;
        case.log(
            "Keyword search",
            &format!(
                "Search finished: {} hits in {} files ({} skipped)",
                report.hits.len(),
                report.files_scanned,
                report.files_skipped
            ),
            None,
        )?;
        Ok(self.last_search.insert(report).clone())
    }

    /// Build the prompt for `target` without sending anything
    pub fn prepare_ai_request(&self, target: &AiTarget) -> ToolkitResult<AiRequest> {
        let case = self.require_case()?;
        let max_chars = self.config.ai.max_context_chars;

        let (kind, source, material, truncated) = match target {
            AiTarget::File(relative) => {
                let path = safe_join(case.dir(), relative.trim())?;
                if !path.is_file() {
                    return Err(ToolkitError::InvalidInput(format!("'{}' is not a file", relative)));
                }
                let source = case.relative_path(&path)?;
                if context::is_sqlite(&path) {
                    let schema = context::format_schema(&context::sqlite_schema(&path)?);
                    let (schema, truncated) = truncate(schema, max_chars);
                    (AnalysisKind::DatabaseSchema, source, schema, truncated)
                } else {
                    let (excerpt, truncated) = context::text_excerpt(&path, max_chars)?;
                    (AnalysisKind::TextFile, source, excerpt, truncated)
                }
            }
            AiTarget::KeywordHits => {
                let report = self.last_search.as_ref().filter(|r| !r.hits.is_empty()).ok_or_else(|| {
                    ToolkitError::InvalidInput("run a keyword search with hits first".to_string())
                })?;
                let (hits, truncated) = context::format_hits(&report.hits, max_chars);
                let source = format!("keyword search for {}", report.keywords.join(", "));
                (AnalysisKind::KeywordHits, source, hits, truncated)
            }
        };

        Ok(AiRequest {
            kind,
            prompt: context::build_prompt(kind, &source, &material, truncated),
            source,
        })
    }

    /// Send `target` to the configured provider and return its answer
    #[cfg(feature = "ai-assistant")]
    pub fn ai_analyze(&self, target: &AiTarget) -> ToolkitResult<String> {
        use crate::analysis::ai::AiAssistant;

        let request = self.prepare_ai_request(target)?;
        let case = self.require_case()?;
        let assistant = AiAssistant::from_config(&self.config.ai)?;
        case.log(
            "AI analysis",
            &format!(
                "{} analysis of {} sent to {} ({})",
                request.kind.as_str(),
                request.source,
                assistant.provider().name(),
                assistant.provider().model()
            ),
            None,
        )?;

        let answer = assistant.analyze_blocking(request.kind.as_str(), &request.prompt)?;
        case.log(
            "AI analysis",
            &format!("Response received ({} characters)", answer.chars().count()),
            None,
        )?;
        Ok(answer)
    }

    #[cfg(not(feature = "ai-assistant"))]
    pub fn ai_analyze(&self, target: &AiTarget) -> ToolkitResult<String> {
        self.prepare_ai_request(target)?;
        Err(ToolkitError::Config(
            "this build does not include the ai-assistant feature".to_string(),
        ))
    }

    /// Run iLEAPP over a backup inside or outside the case folder
    pub fn run_ileapp(
        &self,
        input: &str,
        platform_hint: &str,
        sink: &mut dyn FnMut(&str),
    ) -> ToolkitResult<PathBuf> {
        let command = &self.config.tools.ileapp;
        if !command.is_configured() {
            return Err(ToolkitError::ToolNotConfigured {
                tool: "ileapp".to_string(),
            });
        }
        let path = self.resolve_input(input)?;
        let case = self.require_case()?;
        let hint = match platform_hint.trim() {
            "" => "auto-detect",
            other => other,
        };
        case.log(
            "iLEAPP",
            &format!("Analysis started on {} (platform: {})", path.display(), hint),
            None,
        )?;

        let output = ileapp::run_ileapp(case, command, &self.runner(), &path, sink)?;
        case.log(
            "iLEAPP",
            &format!("Analysis finished; report in {}", case.relative_path(&output)?),
            None,
        )?;
        Ok(output)
    }

    // Report

    pub fn generate_report(&self, analyst: &str) -> ToolkitResult<GeneratedReport> {
        report::generate(self.require_case()?, analyst, &self.config.report)
    }
}

fn truncate(text: String, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (text[..cut].to_string(), true),
        None => (text, false),
    }
}
