//! Server-rendered home page.

use std::fmt::Write;
use url::Url;

use crate::db::models::{PlayerSummary, StatsSnapshot};
use crate::hiscores::skill_name;

/// Render the home page for the given players (in display order).
pub fn render_index(players: &[PlayerSummary]) -> String {
    let cards = if players.is_empty() {
        r#"<p class="empty">No players yet. Add one above.</p>"#.to_string()
    } else {
        players.iter().map(render_card).collect::<Vec<_>>().join("\n")
    };
    PAGE_HTML.replace("{{players}}", &cards)
}

fn render_card(summary: &PlayerSummary) -> String {
    let player = &summary.player;
    let mut html = String::new();

    let _ = write!(
        html,
        r#"<article class="card" data-player-id="{id}">
  <div class="card-head">
    <div>
      <a class="name" href="{href}">{label}</a>
      <div class="muted">@{username}</div>"#,
        id = player.id,
        href = escape_html(&player_path(&player.osrs_username)),
        label = escape_html(player.label()),
        username = escape_html(&player.osrs_username),
    );

    if let Some(status) = &summary.latest_status {
        let _ = write!(
            html,
            "\n      <p class=\"status\">&ldquo;{}&rdquo;</p>",
            escape_html(&status.message)
        );
    }
    html.push_str("\n    </div>\n    <div class=\"totals\">");

    match &summary.latest_stats {
        Some(snapshot) => {
            let _ = write!(
                html,
                "<div>Total lvl: {}</div><div>XP: {}</div>",
                snapshot.stats.total_level,
                group_thousands(snapshot.stats.total_experience)
            );
        }
        None => html.push_str(r#"<span class="muted">No stats yet</span>"#),
    }

    let _ = write!(
        html,
        r#"
      <button class="sync" data-username="{username}">Sync</button>
    </div>
  </div>"#,
        username = escape_html(&player.osrs_username),
    );

    if let Some(snapshot) = &summary.latest_stats {
        html.push_str(&render_skills(snapshot));
    }

    let _ = write!(
        html,
        r#"
  <form class="status-form" data-player-id="{}">
    <input name="message" placeholder="What are you up to?">
    <button type="submit">Post</button>
  </form>
</article>"#,
        player.id
    );
    html
}

fn render_skills(snapshot: &StatsSnapshot) -> String {
    let rows: String = snapshot
        .stats
        .skills
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, entry)| {
            let name = skill_name(i)
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", i));
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                name,
                entry.level,
                group_thousands(entry.xp)
            )
        })
        .collect();
    format!(
        "\n  <details><summary>Skills</summary><table>\
         <thead><tr><th>Skill</th><th>Level</th><th>XP</th></tr></thead>\
         <tbody>{}</tbody></table></details>",
        rows
    )
}

/// Path of the player's history endpoint, with the account name percent-encoded.
fn player_path(osrs_username: &str) -> String {
    let mut url = match Url::parse("http://localhost/players") {
        Ok(url) => url,
        Err(_) => return "/players".to_string(),
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.push(osrs_username);
    }
    url.path().to_string()
}

/// `1234567` → `1,234,567`
fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

const PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>OSRS Friends Hub</title>
<style>
  :root {
    --bg: #0f1117;
    --card: #1a1d27;
    --border: #2a2d3a;
    --accent: #6c63ff;
    --text: #e0e0e0;
    --muted: #8888aa;
  }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  main { max-width: 48rem; margin: 0 auto; padding: 2rem 1rem; display: grid; gap: 1.5rem; }
  h1 { font-size: 1.8rem; font-weight: 700; }
  h2 { font-size: 1rem; font-weight: 600; }
  .card { background: var(--card); border: 1px solid var(--border); border-radius: 10px; padding: 1rem; display: grid; gap: .6rem; }
  .card-head { display: flex; justify-content: space-between; align-items: flex-start; }
  .name { font-weight: 600; color: var(--text); text-decoration: none; }
  .name:hover { text-decoration: underline; }
  .muted, .empty { color: var(--muted); font-size: .8rem; }
  .status { font-style: italic; font-size: .9rem; margin-top: .4rem; }
  .totals { text-align: right; font-size: .9rem; display: grid; gap: .2rem; justify-items: end; }
  form { display: flex; flex-wrap: wrap; gap: .5rem; }
  #add-form { flex-direction: column; }
  input { background: var(--bg); color: var(--text); border: 1px solid var(--border); border-radius: 6px; padding: .35rem .6rem; font-size: .85rem; flex: 1; }
  button { background: none; border: 1px solid var(--border); color: var(--muted); padding: .3rem .8rem; border-radius: 6px; cursor: pointer; font-size: .8rem; }
  button:hover { border-color: var(--accent); color: var(--accent); }
  button:disabled { opacity: .5; }
  table { width: 100%; border-collapse: collapse; margin-top: .4rem; }
  th { padding: .4rem; text-align: left; font-size: .7rem; text-transform: uppercase; color: var(--muted); border-bottom: 1px solid var(--border); }
  td { padding: .3rem .4rem; font-size: .8rem; border-bottom: 1px solid #1e2130; }
  summary { cursor: pointer; font-size: .8rem; color: var(--muted); }
</style>
</head>
<body>
<main>
  <h1>OSRS Friends Hub</h1>

  <form id="add-form" class="card">
    <h2>Add a friend's OSRS account</h2>
    <input name="osrsUsername" placeholder="OSRS username">
    <input name="displayName" placeholder="Display name (optional)">
    <button type="submit">Add account</button>
  </form>

  <section id="players" style="display:grid;gap:.8rem;">
{{players}}
  </section>
</main>

<script>
async function postJson(url, body) {
  const r = await fetch(url, {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: body === undefined ? undefined : JSON.stringify(body),
  });
  if (!r.ok) {
    const data = await r.json().catch(() => null);
    throw new Error((data && data.error) || 'Request failed');
  }
  return r.json();
}

async function withButton(button, label, action) {
  const prev = button.textContent;
  button.disabled = true;
  button.textContent = label;
  try {
    await action();
    window.location.reload();
  } catch (e) {
    alert(e.message);
  } finally {
    button.disabled = false;
    button.textContent = prev;
  }
}

document.getElementById('add-form').addEventListener('submit', e => {
  e.preventDefault();
  const form = e.target;
  const osrsUsername = form.osrsUsername.value.trim();
  if (!osrsUsername) return;
  const displayName = form.displayName.value;
  withButton(form.querySelector('button'), 'Adding…',
    () => postJson('/players', { osrsUsername, displayName }));
});

document.querySelectorAll('button.sync').forEach(button => {
  button.addEventListener('click', () => withButton(button, 'Syncing…',
    () => postJson('/players/' + encodeURIComponent(button.dataset.username) + '/sync')));
});

document.querySelectorAll('form.status-form').forEach(form => {
  form.addEventListener('submit', e => {
    e.preventDefault();
    const message = form.message.value.trim();
    if (!message) return;
    const playerId = Number(form.dataset.playerId);
    withButton(form.querySelector('button'), 'Posting…',
      () => postJson('/status', { playerId, message }));
  });
});
</script>
</body>
</html>"#;
