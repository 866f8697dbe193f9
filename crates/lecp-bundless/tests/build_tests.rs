mod helpers;

use helpers::{Project, has_tool};

const NODE_ESM_CJS: &str = r#"{
    "format": [{ "type": "esm" }, { "type": "cjs" }],
    "targets": { "node": "18" },
    "sourcemap": true,
    "dts": false
}"#;

fn util_project(project: &Project) {
    project
        .write("src/index.ts", "export { add } from \"./util\";\nexport * from \"@/version\";\n")
        .write(
            "src/util/index.ts",
            "export const add = (a: number, b: number): number => a + b;\n",
        )
        .write("src/version.ts", "export const version: string = \"1.0.0\";\n")
        .write("src/util/index.test.ts", "import { add } from \".\";\nadd(1, 2);\n");
}

#[tokio::test]
async fn node_module_package_gets_esm_js_and_cjs() {
    let project = Project::module();
    util_project(&project);

    let summary = project.build(NODE_ESM_CJS).await;
    assert_eq!(summary.failed(), 0, "{summary:?}");

    assert!(project.exists("es/index.js"));
    assert!(project.exists("es/util/index.js"));
    assert!(project.exists("lib/index.cjs"));
    assert!(project.exists("lib/util/index.cjs"));
    assert!(!project.exists("lib/index.js"));
    assert!(!project.exists("es/util/index.test.js"));

    let esm = project.read("es/index.js");
    assert!(esm.contains("./util/index.js"), "{esm}");
    assert!(esm.contains("./version.js"), "alias not rewritten: {esm}");

    let cjs = project.read("lib/index.cjs");
    assert!(cjs.contains("./util/index.cjs"), "{cjs}");
    assert!(!cjs.contains("@/version"), "{cjs}");
}

#[tokio::test]
async fn commonjs_package_gets_mjs_for_node_esm() {
    let project = Project::commonjs();
    util_project(&project);

    let summary = project.build(NODE_ESM_CJS).await;
    assert_eq!(summary.failed(), 0, "{summary:?}");

    assert!(project.exists("es/index.mjs"));
    assert!(project.exists("lib/index.js"));
    assert!(project.read("es/index.mjs").contains("./util/index.mjs"));
}

#[tokio::test]
async fn browser_targets_keep_js_everywhere() {
    let project = Project::module();
    util_project(&project);

    let summary = project
        .build(r#"{ "format": [{ "type": "esm" }, { "type": "cjs" }], "dts": false }"#)
        .await;
    assert_eq!(summary.failed(), 0, "{summary:?}");

    assert!(project.exists("es/index.js"));
    assert!(project.exists("lib/index.js"));
    assert!(!project.exists("lib/index.cjs"));
}

#[tokio::test]
async fn source_maps_point_back_to_sources() {
    let project = Project::module();
    util_project(&project);
    project.build(NODE_ESM_CJS).await;

    for (output, map) in [
        ("es/util/index.js", "es/util/index.js.map"),
        ("lib/util/index.cjs", "lib/util/index.cjs.map"),
    ] {
        let code = project.read(output);
        let file_name = map.rsplit('/').next().unwrap_or_default();
        assert!(
            code.trim_end()
                .ends_with(&format!("//# sourceMappingURL={file_name}")),
            "{output} lacks its map comment"
        );

        let doc: serde_json::Value = serde_json::from_str(&project.read(map)).unwrap();
        let source = doc["sources"][0].as_str().unwrap();
        let out_dir = project.path(output);
        let resolved = path_clean::clean(out_dir.parent().unwrap().join(source));
        assert_eq!(resolved, project.path("src/util/index.ts"));
    }
}

#[tokio::test]
async fn css_module_names_agree_between_script_and_stylesheet() {
    let project = Project::module();
    project
        .write(
            "src/Demo.tsx",
            "import styles from \"./Demo.css\";\nexport const Demo = () => <div className={styles.title} />;\n",
        )
        .write("src/Demo.css", ".title { color: red; }\n");

    let summary = project
        .build(
            r#"{
                "format": [{ "type": "esm" }],
                "css": { "cssModules": true },
                "react": { "jsxRuntime": "automatic" },
                "dts": false
            }"#,
        )
        .await;
    assert_eq!(summary.failed(), 0, "{summary:?}");

    let css = project.read("es/Demo.css");
    let script = project.read("es/Demo.js");
    assert!(css.contains(".demo__title"), "{css}");
    assert!(script.contains("demo__title"), "{script}");
    assert!(script.contains("./Demo.css"), "{script}");
}

#[tokio::test]
async fn assets_and_declarations_are_copied() {
    let project = Project::module();
    project
        .write("src/index.ts", "export {};\n")
        .write("src/logo.svg", "<svg/>")
        .write("src/global.d.ts", "declare const VERSION: string;\n");

    project
        .build(r#"{ "format": [{ "type": "esm" }], "dts": false }"#)
        .await;

    assert_eq!(project.read("es/logo.svg"), "<svg/>");
    assert_eq!(
        project.read("es/global.d.ts"),
        "declare const VERSION: string;\n"
    );
}

#[tokio::test]
async fn rebuilding_is_idempotent() {
    let project = Project::module();
    util_project(&project);

    project.build(NODE_ESM_CJS).await;
    let first = project.snapshot("es");
    project.build(NODE_ESM_CJS).await;
    assert_eq!(first, project.snapshot("es"));
}

#[tokio::test]
async fn stale_outputs_are_cleaned() {
    let project = Project::module();
    util_project(&project);
    project.write("es/stale.js", "old");

    project.build(NODE_ESM_CJS).await;
    assert!(!project.exists("es/stale.js"));

    project.write("es/stale.js", "old");
    project
        .build(
            r#"{ "format": [{ "type": "esm", "targets": { "node": "18" } }], "clean": false, "dts": false }"#,
        )
        .await;
    assert!(project.exists("es/stale.js"));
}

#[tokio::test]
async fn isolated_declarations_need_no_type_checker() {
    let project = Project::module();
    util_project(&project);
    project.write(
        "tsconfig.json",
        r#"{ "compilerOptions": { "isolatedDeclarations": true, "declaration": true } }"#,
    );

    let summary = project
        .build(r#"{ "format": [{ "type": "esm" }, { "type": "cjs" }], "targets": { "node": "18" } }"#)
        .await;
    assert_eq!(summary.failed(), 0, "{summary:?}");

    let esm = project.read("es/util/index.d.ts");
    assert!(esm.contains("add"), "{esm}");
    assert!(project.exists("lib/util/index.d.cts"));
    assert!(project.read("lib/index.d.cts").contains("./util/index.cjs"));
}

#[tokio::test]
async fn program_declarations_from_tsc() {
    let project = Project::module();
    if !has_tool("tsc", &project.root()) {
        eprintln!("tsc not available, skipping");
        return;
    }
    util_project(&project);
    project.write("tsconfig.json", r#"{ "compilerOptions": { "strict": true } }"#);

    project
        .build(r#"{ "format": [{ "type": "esm" }], "targets": { "node": "18" } }"#)
        .await;

    assert!(project.exists("es/util/index.d.ts"));
    assert!(project.exists("es/util/index.d.ts.map"));
    assert!(!project.exists("es/util/index.test.d.ts"));
}

#[tokio::test]
async fn less_compiles_to_css() {
    let project = Project::module();
    if !has_tool("lessc", &project.root()) {
        eprintln!("lessc not available, skipping");
        return;
    }
    project.write("src/theme.less", "@red: #f00;\n.a { color: @red; }\n");

    project
        .build(r#"{ "format": [{ "type": "esm" }], "dts": false }"#)
        .await;

    let css = project.read("es/theme.css");
    assert!(css.contains(".a"), "{css}");
    assert!(!project.exists("es/theme.less"));
}
