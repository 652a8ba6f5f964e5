//! 命令行前端：
//! - `login` / `logout` / `whoami` - 会话管理
//! - `dashboard` - 汇总统计与图表数据
//! - `insumos`, `movimentacoes`, `usuarios` - 资源增删改查

use crate::api::ApiClient;
use crate::conf::Settings;
use crate::model::{Insumo, LoginRequest, Movimentacao, TipoMovimentacao, Usuario};
use crate::service::{self, DashboardAggregator, DashboardView, Gate, GateDecision, Route};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "insumos-admin")]
#[command(version, about = "Administração de insumos e movimentações", long_about = None)]
pub struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = crate::conf::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// 覆盖日志级别
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 用账号密码换取令牌并保存会话
    Login {
        #[arg(short, long)]
        username: String,
        /// 省略时从标准输入读取
        #[arg(short, long, env = "INSUMOS_PASSWORD")]
        password: Option<String>,
    },

    /// 清除已保存的会话
    Logout,

    /// 显示当前身份与角色
    Whoami,

    /// 显示仪表盘统计与图表数据
    Dashboard {
        /// 以 JSON 输出
        #[arg(long)]
        json: bool,
    },

    /// 物料
    #[command(subcommand)]
    Insumos(InsumosCommands),

    /// 库存变动
    #[command(subcommand)]
    Movimentacoes(MovimentacoesCommands),

    /// 用户管理（需要 ROLE_ADMIN）
    #[command(subcommand)]
    Usuarios(UsuariosCommands),
}

#[derive(Subcommand, Debug)]
pub enum InsumosCommands {
    List,
    Show {
        id: i64,
    },
    Add(InsumoFields),
    Update {
        id: i64,
        #[command(flatten)]
        fields: InsumoFields,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum MovimentacoesCommands {
    List,
    Add {
        #[arg(long)]
        insumo: i64,
        /// ENTRADA 或 SAIDA
        #[arg(long)]
        tipo: TipoMovimentacao,
        #[arg(long, default_value = "1")]
        quantidade: i32,
    },
    Update {
        id: i64,
        #[command(flatten)]
        fields: MovimentacaoFields,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum UsuariosCommands {
    List,
    Add(UsuarioFields),
    Update {
        id: i64,
        #[command(flatten)]
        fields: UsuarioFields,
    },
    Delete {
        id: i64,
    },
}

/// 未给出的字段保持原值
#[derive(Args, Debug, Default)]
pub struct InsumoFields {
    #[arg(long)]
    pub codigo: Option<String>,
    #[arg(long)]
    pub nome: Option<String>,
    #[arg(long)]
    pub descricao: Option<String>,
    /// 临界数量
    #[arg(long)]
    pub critica: Option<i32>,
    /// 库存数量
    #[arg(long)]
    pub estoque: Option<i32>,
}

impl InsumoFields {
    pub fn apply(self, insumo: &mut Insumo) {
        if let Some(codigo) = self.codigo {
            insumo.codigo = codigo;
        }
        if let Some(nome) = self.nome {
            insumo.nome = nome;
        }
        if self.descricao.is_some() {
            insumo.descricao = self.descricao;
        }
        if self.critica.is_some() {
            insumo.quantidade_critica = self.critica;
        }
        if self.estoque.is_some() {
            insumo.quantidade_estoque = self.estoque;
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct MovimentacaoFields {
    #[arg(long)]
    pub insumo: Option<i64>,
    #[arg(long)]
    pub tipo: Option<TipoMovimentacao>,
    #[arg(long)]
    pub quantidade: Option<i32>,
    /// 例如 2026-10-17T09:30:00
    #[arg(long)]
    pub data: Option<String>,
}

impl MovimentacaoFields {
    pub fn apply(self, movimentacao: &mut Movimentacao) {
        if let Some(insumo) = self.insumo {
            movimentacao.insumo_id = insumo;
        }
        if let Some(tipo) = self.tipo {
            movimentacao.tipo = tipo;
        }
        if let Some(quantidade) = self.quantidade {
            movimentacao.quantidade = quantidade;
        }
        if self.data.is_some() {
            movimentacao.data = self.data;
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct UsuarioFields {
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub nome: Option<String>,
    #[arg(long)]
    pub senha: Option<String>,
    #[arg(long)]
    pub telefone: Option<String>,
    /// 可重复；给出时整体替换角色列表
    #[arg(long = "role")]
    pub roles: Vec<String>,
}

impl UsuarioFields {
    pub fn apply(self, usuario: &mut Usuario) {
        if let Some(email) = self.email {
            usuario.email = email;
        }
        if self.nome.is_some() {
            usuario.nome = self.nome;
        }
        if self.senha.is_some() {
            usuario.senha = self.senha;
        }
        if self.telefone.is_some() {
            usuario.telefone = self.telefone;
        }
        if !self.roles.is_empty() {
            usuario.role = self.roles;
        }
    }
}

pub async fn run(cli: Cli, settings: &Settings) -> Result<()> {
    let session = service::init_session(settings);
    let api = ApiClient::new(settings, session.clone()).context("invalid api.base_url")?;
    let gate = Gate::new(&session);

    match cli.command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password()?,
            };
            let current = session
                .login(&LoginRequest { username, password })
                .await?;
            let user = current.user.context("login returned no identity")?;
            println!("Logged in as {} ({})", user.username, join_roles(&user.roles));
        }
        Commands::Logout => {
            session.logout();
            println!("Logged out");
        }
        Commands::Whoami => match session.current_user() {
            Some(user) if session.is_authenticated() => {
                println!("{} <{}>", user.username, user.subject);
                println!("roles: {}", join_roles(&user.roles));
            }
            _ => println!("Not logged in"),
        },
        Commands::Dashboard { json } => {
            enter(&gate, Route::Dashboard)?;
            let view = api.fetch_dashboard(&DashboardAggregator::default()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_dashboard(&view);
            }
        }
        Commands::Insumos(cmd) => {
            enter(&gate, Route::Insumos)?;
            let resource = api.insumos();
            match cmd {
                InsumosCommands::List => {
                    for i in resource.find_all().await? {
                        println!(
                            "{:>5}  {:<10} {:<30} crítica={:<5} estoque={}",
                            i.id.unwrap_or_default(),
                            i.codigo,
                            i.nome,
                            i.quantidade_critica.unwrap_or(0),
                            i.quantidade_estoque.unwrap_or(0)
                        );
                    }
                }
                InsumosCommands::Show { id } => {
                    let insumo = resource.find_by_id(id).await?;
                    println!("{}", serde_json::to_string_pretty(&insumo)?);
                }
                InsumosCommands::Add(fields) => {
                    let mut insumo = Insumo::default();
                    fields.apply(&mut insumo);
                    let created = resource.create(&insumo).await?;
                    println!("Insumo {} criado", created.id.unwrap_or_default());
                }
                InsumosCommands::Update { id, fields } => {
                    let mut insumo = resource.find_by_id(id).await?;
                    fields.apply(&mut insumo);
                    resource.update(id, &insumo).await?;
                    println!("Insumo {} atualizado", id);
                }
                InsumosCommands::Delete { id } => {
                    resource.delete(id).await?;
                    println!("Insumo {} excluído", id);
                }
            }
        }
        Commands::Movimentacoes(cmd) => {
            enter(&gate, Route::Movimentacoes)?;
            let resource = api.movimentacoes();
            match cmd {
                MovimentacoesCommands::List => {
                    for m in resource.find_all().await? {
                        println!(
                            "{:>5}  {:<16} {:<8} {:>5}  {}",
                            m.id.unwrap_or_default(),
                            m.data.as_deref().unwrap_or("-"),
                            m.tipo,
                            m.quantidade,
                            m.insumo_nome.as_deref().unwrap_or("-")
                        );
                    }
                }
                MovimentacoesCommands::Add {
                    insumo,
                    tipo,
                    quantidade,
                } => {
                    let usuario_id = api.current_user_id().await?;
                    let record = Movimentacao::new_entry(
                        usuario_id,
                        insumo,
                        tipo,
                        quantidade,
                        chrono::Local::now().naive_local(),
                    );
                    let created = resource.create(&record).await?;
                    println!("Movimentação {} criada", created.id.unwrap_or_default());
                }
                MovimentacoesCommands::Update { id, fields } => {
                    let mut record = resource.find_by_id(id).await?;
                    fields.apply(&mut record);
                    resource.update(id, &record).await?;
                    println!("Movimentação {} atualizada", id);
                }
                MovimentacoesCommands::Delete { id } => {
                    resource.delete(id).await?;
                    println!("Movimentação {} excluída", id);
                }
            }
        }
        Commands::Usuarios(cmd) => {
            enter(&gate, Route::Usuarios)?;
            let resource = api.usuarios();
            match cmd {
                UsuariosCommands::List => {
                    for u in resource.find_all().await? {
                        println!(
                            "{:>5}  {:<30} {}",
                            u.id.unwrap_or_default(),
                            u.email,
                            u.role.join(",")
                        );
                    }
                }
                UsuariosCommands::Add(fields) => {
                    let mut usuario = Usuario::default();
                    fields.apply(&mut usuario);
                    let created = resource.create(&usuario).await?;
                    println!("Usuário {} criado", created.id.unwrap_or_default());
                }
                UsuariosCommands::Update { id, fields } => {
                    let mut usuario = resource.find_by_id(id).await?;
                    fields.apply(&mut usuario);
                    resource.update(id, &usuario).await?;
                    println!("Usuário {} atualizado", id);
                }
                UsuariosCommands::Delete { id } => {
                    resource.delete(id).await?;
                    println!("Usuário {} excluído", id);
                }
            }
        }
    }

    Ok(())
}

fn enter(gate: &Gate<'_>, route: Route) -> Result<()> {
    match gate.check(route) {
        GateDecision::Allow => Ok(()),
        GateDecision::Redirect(Route::Login) => {
            bail!("{} requires login; run `insumos-admin login -u <user>`", route)
        }
        GateDecision::Redirect(_) => bail!("access to {} denied for the current user", route),
    }
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn join_roles<'a>(roles: impl IntoIterator<Item = &'a String>) -> String {
    let joined = roles
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "no roles".to_string()
    } else {
        joined
    }
}

fn print_dashboard(view: &DashboardView) {
    println!("Total de insumos:       {}", view.total_insumos);
    println!("Insumos críticos:       {}", view.insumos_criticos);
    println!("Movimentações no mês:   {}", view.movimentacoes_mes);
    println!("Entradas no mês:        {}", view.entradas_mes);
    println!();
    println!(
        "{}: {}  {}: {}",
        view.distribution.labels[0],
        view.distribution.entradas,
        view.distribution.labels[1],
        view.distribution.saidas
    );
    println!();
    for (label, count) in view.trend.labels.iter().zip(view.trend.counts) {
        println!("{}  {:>4} {}", label, count, "#".repeat(count.min(60)));
    }
}
