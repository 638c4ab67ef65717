//! Rendering of operation results as tables or JSON.

use anyhow::{bail, Result};
use kubedispatch_core::domain::ResourceOutput;
use kubedispatch_core::OperationResult;

/// Prints a result, or fails with its error so the process exits non-zero.
pub fn print_result(result: &OperationResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        if let Some(error) = &result.error {
            bail!("{}", error);
        }
        return Ok(());
    }

    if let Some(error) = &result.error {
        bail!("{}", error);
    }

    if let Some(output) = &result.output {
        print_output(output);
    }
    Ok(())
}

fn print_output(output: &ResourceOutput) {
    match output {
        ResourceOutput::Pod(pod) => print_pods(std::slice::from_ref(pod)),
        ResourceOutput::Pods(pods) => {
            if pods.is_empty() {
                println!("No pods found.");
                return;
            }
            print_pods(pods);
            println!("\nTotal: {} pods", pods.len());
        }
        ResourceOutput::Deployment(deployment) => print_deployments(std::slice::from_ref(deployment)),
        ResourceOutput::Deployments(deployments) => {
            if deployments.is_empty() {
                println!("No deployments found.");
                return;
            }
            print_deployments(deployments);
            println!("\nTotal: {} deployments", deployments.len());
        }
        ResourceOutput::Namespace(namespace) => print_namespaces(std::slice::from_ref(namespace)),
        ResourceOutput::Namespaces(namespaces) => {
            if namespaces.is_empty() {
                println!("No namespaces found.");
                return;
            }
            print_namespaces(namespaces);
            println!("\nTotal: {} namespaces", namespaces.len());
        }
        ResourceOutput::Deleted {
            kind,
            name,
            namespace,
        } => match namespace {
            Some(ns) => println!("✓ Deleted {} {}/{}", kind, ns, name),
            None => println!("✓ Deleted {} {}", kind, name),
        },
        ResourceOutput::Scaled {
            name,
            namespace,
            replicas,
        } => println!("✓ Scaled deployment {}/{} to {} replicas", namespace, name, replicas),
        ResourceOutput::Forwarding {
            id,
            pod,
            namespace,
            local_port,
            remote_port,
        } => println!(
            "✓ Forwarding 127.0.0.1:{} -> {}/{}:{} ({})",
            local_port, namespace, pod, remote_port, id
        ),
        ResourceOutput::Cluster { server_version } => {
            println!("✓ Cluster reachable (server {})", server_version)
        }
        ResourceOutput::Release(release) => print_releases(std::slice::from_ref(release)),
        ResourceOutput::Releases(releases) => {
            if releases.is_empty() {
                println!("No releases found.");
                return;
            }
            print_releases(releases);
            println!("\nTotal: {} releases", releases.len());
        }
        ResourceOutput::ReleaseUninstalled { name, namespace } => {
            println!("✓ Uninstalled release {}/{}", namespace, name)
        }
        ResourceOutput::ReleaseValues { values, .. } => {
            // Values have no tabular form.
            match serde_json::to_string_pretty(values) {
                Ok(text) => println!("{}", text),
                Err(_) => println!("{}", values),
            }
        }
        ResourceOutput::RolledBack {
            name,
            namespace,
            revision,
        } => match revision {
            Some(revision) => println!("✓ Rolled back {}/{} to revision {}", namespace, name, revision),
            None => println!("✓ Rolled back {}/{} to the previous revision", namespace, name),
        },
        ResourceOutput::Repositories(repositories) => {
            if repositories.is_empty() {
                println!("No repositories configured.");
                return;
            }
            println!("{:<20} URL", "NAME");
            println!("{}", "-".repeat(80));
            for repository in repositories {
                println!("{:<20} {}", truncate(&repository.name, 20), repository.url);
            }
        }
        ResourceOutput::RepositoryAdded { name, url } => {
            println!("✓ Added repository {} ({})", name, url)
        }
        ResourceOutput::RepositoryRemoved { name } => println!("✓ Removed repository {}", name),
        ResourceOutput::RepositoriesUpdated => println!("✓ Repositories updated"),
        ResourceOutput::Charts(charts) => {
            if charts.is_empty() {
                println!("No charts found.");
                return;
            }
            println!("{:<30} {:<12} {:<12} DESCRIPTION", "NAME", "VERSION", "APP VERSION");
            println!("{}", "-".repeat(80));
            for chart in charts {
                println!(
                    "{:<30} {:<12} {:<12} {}",
                    truncate(&chart.name, 30),
                    truncate(&chart.version, 12),
                    truncate(chart.app_version.as_deref().unwrap_or("-"), 12),
                    chart.description.as_deref().unwrap_or("-")
                );
            }
        }
    }
}

fn print_releases(releases: &[kubedispatch_core::domain::ReleaseSummary]) {
    println!(
        "{:<24} {:<16} {:<5} {:<10} CHART",
        "NAME", "NAMESPACE", "REV", "STATUS"
    );
    println!("{}", "-".repeat(80));

    for release in releases {
        println!(
            "{:<24} {:<16} {:<5} {:<10} {}",
            truncate(&release.name, 24),
            truncate(&release.namespace, 16),
            release.revision,
            truncate(&release.status, 10),
            release.chart
        );
    }
}

fn print_pods(pods: &[kubedispatch_core::domain::PodSummary]) {
    println!(
        "{:<30} {:<16} {:<10} {:<15} NODE",
        "NAME", "NAMESPACE", "PHASE", "IP"
    );
    println!("{}", "-".repeat(80));

    for pod in pods {
        println!(
            "{:<30} {:<16} {:<10} {:<15} {}",
            truncate(&pod.name, 30),
            truncate(&pod.namespace, 16),
            pod.phase.as_deref().unwrap_or("-"),
            pod.ip.as_deref().unwrap_or("-"),
            pod.node.as_deref().unwrap_or("-")
        );
    }
}

fn print_deployments(deployments: &[kubedispatch_core::domain::DeploymentSummary]) {
    println!(
        "{:<30} {:<16} {:<8} {:<10} IMAGE",
        "NAME", "NAMESPACE", "READY", "AVAILABLE"
    );
    println!("{}", "-".repeat(80));

    for deployment in deployments {
        let ready = format!(
            "{}/{}",
            deployment.ready.unwrap_or(0),
            deployment.replicas.unwrap_or(0)
        );
        println!(
            "{:<30} {:<16} {:<8} {:<10} {}",
            truncate(&deployment.name, 30),
            truncate(&deployment.namespace, 16),
            ready,
            deployment.available.unwrap_or(0),
            deployment.image.as_deref().unwrap_or("-")
        );
    }
}

fn print_namespaces(namespaces: &[kubedispatch_core::domain::NamespaceSummary]) {
    println!("{:<30} {:<12} LABELS", "NAME", "STATUS");
    println!("{}", "-".repeat(80));

    for namespace in namespaces {
        let labels = namespace
            .labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{:<30} {:<12} {}",
            truncate(&namespace.name, 30),
            namespace.phase.as_deref().unwrap_or("-"),
            if labels.is_empty() { "-" } else { &labels }
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubedispatch_core::{ErrorInfo, ErrorKind};

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("web-1", 30), "web-1");
        assert_eq!(truncate("abcdefgh", 5), "abcd…");
    }

    #[test]
    fn test_failed_result_is_an_error() {
        let result = OperationResult::failed(ErrorInfo::new(ErrorKind::ResourceNotFound, "pod web-1"));
        let err = print_result(&result, false).unwrap_err();
        assert!(err.to_string().contains("resource not found"));
    }
}
