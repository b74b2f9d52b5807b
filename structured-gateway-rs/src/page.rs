//! Single-page UI served at `/`

/// Placeholder replaced with the default model path
const MODEL_PLACEHOLDER: &str = "{{DEFAULT_MODEL}}";

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Structured Output</title>
<style>
  body { font-family: sans-serif; max-width: 860px; margin: 2rem auto; padding: 0 1rem; }
  label { display: block; margin-top: 1rem; font-weight: bold; }
  input, textarea { width: 100%; box-sizing: border-box; font-family: monospace; }
  pre { background: #f4f4f4; padding: 1rem; white-space: pre-wrap; min-height: 4rem; }
  button { margin-top: 1rem; margin-right: 0.5rem; }
</style>
</head>
<body>
<h1>Structured Output</h1>
<label for="model">Model path</label>
<input id="model" type="text" value="{{DEFAULT_MODEL}}">
<label for="prompt">Prompt</label>
<textarea id="prompt" rows="4">What is (3^2 + 4^2)?</textarea>
<button id="run">Run</button>
<button id="debug">Show Debug</button>
<label>Output</label>
<pre id="output"></pre>
<label>Debug Attempts</label>
<pre id="trace"></pre>
<script>
  const output = document.getElementById("output");
  const trace = document.getElementById("trace");
  document.getElementById("run").onclick = async () => {
    output.textContent = "Running...";
    const res = await fetch("/api/v1/run", {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify({
        prompt: document.getElementById("prompt").value,
        model_path: document.getElementById("model").value
      })
    });
    const type = res.headers.get("content-type") || "";
    if (type.includes("application/json")) {
      const body = await res.json();
      output.textContent = res.ok ? body.output : "Error: " + body.error;
    } else {
      output.textContent = "Error: HTTP " + res.status + " " + (await res.text());
    }
  };
  document.getElementById("debug").onclick = async () => {
    const res = await fetch("/api/v1/trace");
    trace.textContent = (await res.json()).trace;
  };
</script>
</body>
</html>
"#;

/// Render the page with the model field pre-filled
pub fn render_index(default_model: &str) -> String {
    INDEX_TEMPLATE.replace(MODEL_PLACEHOLDER, &escape_attribute(default_model))
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
