//! Warm-up: compile templates ahead of the first request.

use super::TemplateManager;
use super::history::{WarmupError, WarmupRecord, WarmupSummary};
use crate::persistence::Slot;

impl TemplateManager {
    /// Compile the logical templates in `templates` (names without extension).
    ///
    /// Names are trimmed and blanks ignored. A template already known as compiled
    /// (compile index or an existing artifact) is skipped unless `force` is set.
    /// Failures are counted and described in `error_details`; the call itself
    /// never fails.
    pub fn warmup<S: AsRef<str>>(&mut self, templates: &[S], force: bool) -> WarmupSummary {
        self.load_compile_index();
        let mut summary = WarmupSummary::default();

        for logical in templates {
            let logical = logical.as_ref().trim();
            if logical.is_empty() {
                continue;
            }
            let template = self.template_name(logical);
            let already = self.index.is_compiled(logical)
                || self.artifacts.as_ref().is_some_and(|cache| cache.contains(&template));
            if already && !force {
                summary.skipped += 1;
                continue;
            }

            match self.engine().compile(&template, force) {
                Ok(()) => {
                    self.index.mark_compiled(logical);
                    summary.compiled += 1;
                    tracing::info!("Warmed up template {}", logical);
                }
                Err(e) => {
                    let message = e.to_string().replace(['\n', '\r'], " ");
                    tracing::error!("Warm-up failed for template {}: {}", logical, message);
                    summary.errors += 1;
                    summary.error_details.push(WarmupError {
                        template: logical.to_string(),
                        error: message,
                    });
                }
            }
        }

        if summary.compiled > 0 {
            self.index.persist(&self.sink);
        }
        self.record_warmup(WarmupRecord::new(summary.clone(), false));
        summary
    }

    /// [`warmup`](Self::warmup) every discovered template.
    pub fn warmup_all(&mut self, force: bool) -> WarmupSummary {
        let templates = self.discovered_templates();
        let summary = self.warmup(&templates, force);
        if let Some(mut record) = self.last_warmup.take() {
            record.all = true;
            self.record_warmup(record);
        }
        tracing::info!(
            "Full warm-up of {} template(s): {} compiled, {} skipped, {} failed",
            templates.len(),
            summary.compiled,
            summary.skipped,
            summary.errors
        );
        summary
    }

    /// The last warm-up, from this process or loaded from storage.
    pub fn last_warmup(&self) -> Option<&WarmupRecord> {
        self.last_warmup.as_ref()
    }

    fn record_warmup(&mut self, record: WarmupRecord) {
        if self.capabilities.warmup_summary {
            self.sink.try_save(Slot::WarmupSummary, &record);
        }
        self.last_warmup = Some(record);
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Profile, TemplatesConfig};
    use crate::manager::TemplateManager;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TemplatesConfig) {
        let temp = TempDir::new().unwrap();
        let views = temp.path().join("views");
        fs::create_dir_all(&views).unwrap();
        fs::write(views.join("base.html"), "<main>{% block body %}{% endblock %}</main>").unwrap();
        fs::write(views.join("home.html"), "{% extends \"base.html\" %}{% block body %}home{% endblock %}").unwrap();
        fs::write(views.join("broken.html"), "{% if %}").unwrap();

        let mut config = TemplatesConfig::default();
        config.paths = vec![views];
        config.cache.directory = temp.path().join("cache");
        (temp, config)
    }

    #[test]
    fn test_warmup_compiles_then_skips() {
        let (_temp, config) = setup();
        let mut manager = TemplateManager::new(config);

        let summary = manager.warmup(&["base", " ", "home"], false);
        assert_eq!((summary.compiled, summary.skipped, summary.errors), (2, 0, 0));
        assert!(summary.error_details.is_empty());

        let summary = manager.warmup(&["home", "base"], false);
        assert_eq!((summary.compiled, summary.skipped), (0, 2));

        let summary = manager.warmup(&["home"], true);
        assert_eq!(summary.compiled, 1);
    }

    #[test]
    fn test_warmup_collects_errors() {
        let (_temp, config) = setup();
        let mut manager = TemplateManager::new(config);

        let summary = manager.warmup(&["broken", "nope", "home"], false);
        assert_eq!(summary.compiled, 1);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.error_details[0].template, "broken");
        assert!(!summary.error_details[0].error.contains('\n'));
        assert_eq!(summary.error_details[1].template, "nope");
        assert!(!manager.is_compiled("broken"));
    }

    #[test]
    fn test_all_failures_still_summarized() {
        let (_temp, config) = setup();
        let mut manager = TemplateManager::new(config);
        let summary = manager.warmup(&["a", "b"], false);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.compiled, 0);
    }

    #[test]
    fn test_index_visible_to_new_manager() {
        let (temp, config) = setup();
        let mut first = TemplateManager::new(config.clone());
        assert!(!first.is_compiled("home"));
        first.warmup(&["home"], false);
        assert!(temp.path().join("cache/compile-index.json").is_file());

        let mut second = TemplateManager::new(config);
        assert!(second.is_compiled("home"));
        let summary = second.warmup(&["home"], false);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_warmup_all_marks_full_run() {
        let (temp, config) = setup();
        let mut manager = TemplateManager::new(config.clone());
        let summary = manager.warmup_all(false);
        assert_eq!(summary.compiled, 2);
        assert_eq!(summary.errors, 1);
        assert!(manager.last_warmup().unwrap().all);

        let reloaded = TemplateManager::new(config);
        let record = reloaded.last_warmup().unwrap();
        assert!(record.all);
        assert_eq!(record.summary.errors, 1);
        assert!(temp.path().join("cache/warmup-summary.json").is_file());
    }

    #[test]
    fn test_lean_profile_skips_summary_persistence() {
        let (temp, mut config) = setup();
        config.diagnostics.profile = Profile::Lean;
        let mut manager = TemplateManager::new(config);
        manager.warmup(&["home"], false);

        assert!(manager.last_warmup().is_some());
        assert!(!temp.path().join("cache/warmup-summary.json").exists());
        assert!(temp.path().join("cache/compile-index.json").is_file());
    }
}
