//! CLI runner - 설정 해석, 파이프라인 실행, 전달

use crate::delivery::{Delivered, Delivery};
use crate::display::Display;
use crate::Args;
use cmdgen_core::{CommandCache, Pipeline, Request, StoreCache};
use cmdgen_foundation::{
    sweep_stale_locks, AuditCategory, AuditLogger, AuditQuery, CmdgenConfig, Error,
    FileStateStore, Result, StatePaths, SystemClock, STALE_LOCK_AGE,
};
use cmdgen_provider::ProcessBackend;
use std::io::{self, IsTerminal, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// 시작 단계: 기본값 → 설정 파일 → 환경 변수 → CLI 플래그 → 검증
pub fn load_config(args: &Args, paths: &StatePaths) -> Result<CmdgenConfig> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| paths.config_file.clone());

    let mut config = CmdgenConfig::load_from(&config_path)?;
    config.apply_env(|name| std::env::var(name).ok())?;
    apply_flags(&mut config, args)?;
    config.validate()?;

    Ok(config)
}

fn apply_flags(config: &mut CmdgenConfig, args: &Args) -> Result<()> {
    if args.safe {
        config.safe_mode = true;
    }
    if args.debug {
        config.debug = true;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    if let Some(mode) = &args.output {
        config.output_mode = mode.parse()?;
    }
    if args.no_color {
        config.color_output = false;
    }
    Ok(())
}

/// 이전 실행이 남긴 오래된 락 정리
pub fn sweep_locks(paths: &StatePaths) {
    let mut roots = vec![paths.base_dir.as_path()];
    if !paths.cache_dir.starts_with(&paths.base_dir) {
        roots.push(paths.cache_dir.as_path());
    }

    for root in roots {
        match sweep_stale_locks(root, STALE_LOCK_AGE) {
            Ok(0) => {}
            Ok(reclaimed) => debug!(root = %root.display(), reclaimed, "Reclaimed stale locks"),
            Err(e) => warn!(root = %root.display(), error = %e, "Stale lock sweep failed"),
        }
    }
}

/// `--clear-cache`
pub fn clear_cache(config: &CmdgenConfig, cache_dir: &Path, display: &Display) -> Result<()> {
    let cache = StoreCache::new(
        Arc::new(FileStateStore::new(cache_dir)),
        Arc::new(SystemClock),
        config.cache_ttl,
    );
    let removed = cache.clear()?;
    display.notice(&format!("Removed {} cache entries", removed));
    Ok(())
}

/// 통계와 함께 보여줄 최근 보안 이벤트 수
const RECENT_SECURITY_EVENTS: usize = 5;

/// `--stats`
pub fn show_stats(audit_log: &Path, display: &Display) -> Result<()> {
    let logger = AuditLogger::new(audit_log);
    let stats = logger.statistics()?;
    let recent = logger.query(
        &AuditQuery::new()
            .with_categories(vec![AuditCategory::SecurityEvent])
            .with_limit(RECENT_SECURITY_EVENTS),
    )?;
    display.statistics(&stats, &recent);
    Ok(())
}

/// 요청 인자, 없으면 파이프된 stdin (원문 바이트 그대로)
pub fn read_request(words: &[String]) -> Result<Request> {
    if !words.is_empty() {
        return Ok(Request::new(words.join(" ")));
    }

    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Err(Error::InvalidInput(
            "no request given (pass it as arguments or pipe it on stdin)".to_string(),
        ));
    }

    let mut raw = Vec::new();
    stdin.read_to_end(&mut raw)?;
    Ok(Request::from_bytes(raw))
}

/// 명령어 생성 후 전달
pub async fn generate(
    args: &Args,
    config: CmdgenConfig,
    paths: &StatePaths,
    display: &Display,
) -> Result<()> {
    let request = read_request(&args.request)?;

    let backend = ProcessBackend::resolve(&config.backend_command, config.backend_args.clone())
        .map_err(Error::from)?;
    let output_mode = config.output_mode;
    let pipeline = Pipeline::open(config, paths, Arc::new(backend), !args.no_cache)?;

    // Ctrl-C: 파이프라인 future를 drop하면 자식 프로세스 종료, 락/슬롯 해제
    let outcome = tokio::select! {
        result = pipeline.run(&request) => result?,
        _ = tokio::signal::ctrl_c() => return Err(Error::Interrupted),
    };

    display.sensitive(&outcome.sensitive);
    if let Some(warning) = &outcome.warning {
        display.safety_warning(warning);
    }

    let mut stdout = io::stdout().lock();
    if args.dry_run {
        writeln!(stdout, "{}", outcome.command)?;
        return Ok(());
    }

    match Delivery::detect().deliver(&outcome.command, output_mode, &mut stdout)? {
        Delivered::Prefill(_) => display.notice("Command placed on your prompt"),
        Delivered::Clipboard => display.notice("Command copied to clipboard"),
        Delivered::Stdout => {}
    }

    Ok(())
}
