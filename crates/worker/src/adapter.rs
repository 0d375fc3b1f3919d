//! Subprocess adapter around the external SteadyDancer CLI.
//!
//! Builds the CLI invocation from a task payload, captures stdout/stderr,
//! and shapes the result into the report contract the API reconciles
//! against: `{success, video_path|input_dir, stdout, stderr, return_code}`.

use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use serde_json::{json, Value};
use steadydancer_core::generation::{
    DEFAULT_BASE_SEED, DEFAULT_CONDITION_GUIDE_SCALE, DEFAULT_END_COND_CFG, DEFAULT_FRAME_NUM,
    DEFAULT_SAMPLE_GUIDE_SCALE, DEFAULT_SIZE,
};
use tokio::process::Command;

use crate::WorkerConfig;

/// Run I2V generation for a job.
///
/// Payload: `{job_id, input_dir, params}`. The video is written into the
/// job's sibling `tmp/` directory; the API moves it into `output/` when
/// it reconciles the success report.
pub async fn run_generation(config: &WorkerConfig, payload: &Value) -> anyhow::Result<Value> {
    let input_dir = payload["input_dir"]
        .as_str()
        .context("payload missing input_dir")?;
    let job_id = payload["job_id"].as_str().context("payload missing job_id")?;
    let params = &payload["params"];

    // input/ and tmp/ are siblings under the job root.
    let tmp_dir = Path::new(input_dir)
        .parent()
        .context("input_dir has no parent")?
        .join("tmp");
    let video_path = tmp_dir.join(format!("{job_id}.mp4"));

    let mut cmd = Command::new(&config.cli_command);
    cmd.arg("generate")
        .arg("--input-dir")
        .arg(input_dir)
        .arg("--output")
        .arg(&video_path)
        .arg("--size")
        .arg(params["size"].as_str().unwrap_or(DEFAULT_SIZE))
        .arg("--frame-num")
        .arg(
            params["frame_num"]
                .as_i64()
                .unwrap_or(DEFAULT_FRAME_NUM as i64)
                .to_string(),
        )
        .arg("--sample-guide-scale")
        .arg(
            params["sample_guide_scale"]
                .as_f64()
                .unwrap_or(DEFAULT_SAMPLE_GUIDE_SCALE)
                .to_string(),
        )
        .arg("--condition-guide-scale")
        .arg(
            params["condition_guide_scale"]
                .as_f64()
                .unwrap_or(DEFAULT_CONDITION_GUIDE_SCALE)
                .to_string(),
        )
        .arg("--end-cond-cfg")
        .arg(
            params["end_cond_cfg"]
                .as_f64()
                .unwrap_or(DEFAULT_END_COND_CFG)
                .to_string(),
        )
        .arg("--base-seed")
        .arg(
            params["base_seed"]
                .as_i64()
                .unwrap_or(DEFAULT_BASE_SEED)
                .to_string(),
        );

    if let Some(prompt) = params["prompt_override"].as_str() {
        cmd.arg("--prompt").arg(prompt);
    }
    if let Some(steps) = params["sample_steps"].as_i64() {
        cmd.arg("--sample-steps").arg(steps.to_string());
    }
    if let Some(shift) = params["sample_shift"].as_f64() {
        cmd.arg("--sample-shift").arg(shift.to_string());
    }
    if let Some(solver) = params["sample_solver"].as_str() {
        cmd.arg("--sample-solver").arg(solver);
    }
    if let Some(offload) = params["offload_model"].as_bool() {
        cmd.arg("--offload-model").arg(offload.to_string());
    }
    if let Some(devices) = params["cuda_visible_devices"].as_str() {
        cmd.env("CUDA_VISIBLE_DEVICES", devices);
    }

    let output = run_cli(config, cmd).await?;
    let success = output.return_code == 0 && video_path.is_file();

    Ok(json!({
        "success": success,
        "video_path": if success { Some(video_path.display().to_string()) } else { None },
        "stdout": output.stdout,
        "stderr": output.stderr,
        "return_code": output.return_code,
    }))
}

/// Run experiment preprocessing: normalize a reference image + driving
/// video pair into the experiment's `input/` directory (pair_dir format).
pub async fn run_preprocess(config: &WorkerConfig, payload: &Value) -> anyhow::Result<Value> {
    let reference_image_path = payload["reference_image_path"]
        .as_str()
        .context("payload missing reference_image_path")?;
    let motion_video_path = payload["motion_video_path"]
        .as_str()
        .context("payload missing motion_video_path")?;
    let target_input_dir = payload["target_input_dir"]
        .as_str()
        .context("payload missing target_input_dir")?;

    let mut cmd = Command::new(&config.cli_command);
    cmd.arg("preprocess")
        .arg("--ref-image")
        .arg(reference_image_path)
        .arg("--motion-video")
        .arg(motion_video_path)
        .arg("--out-dir")
        .arg(target_input_dir);

    if let Some(prompt) = payload["prompt"].as_str() {
        cmd.arg("--prompt").arg(prompt);
    }

    let output = run_cli(config, cmd).await?;
    let success = output.return_code == 0;

    Ok(json!({
        "success": success,
        "input_dir": if success { Some(target_input_dir) } else { None },
        "stdout": output.stdout,
        "stderr": output.stderr,
        "return_code": output.return_code,
    }))
}

struct CliOutput {
    stdout: String,
    stderr: String,
    return_code: i32,
}

/// Spawn the CLI and capture its output.
async fn run_cli(config: &WorkerConfig, mut cmd: Command) -> anyhow::Result<CliOutput> {
    cmd.env("MODELS_DIR", &config.models_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = cmd
        .output()
        .await
        .with_context(|| format!("failed to spawn {}", config.cli_command))?;

    Ok(CliOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        return_code: output.status.code().unwrap_or(-1),
    })
}
